//! Celebration message templates.
//!
//! Placeholders: `{mention}` (platform mention markup), `{name}` (display name)
//! and `{class}` (class name).

/// Built-in templates, used when none are configured.
pub const DEFAULT_TEMPLATES: &[&str] = &[
    "🎉 {mention} just joined the {class} ranks!",
    "Congratulations {mention}, you're now part of {class}!",
    "Everyone welcome {name} ({mention}) to {class}! 🎊",
];

/// Fills the placeholders of `template`.
pub fn render(template: &str, class: &str, mention: &str, name: &str) -> String {
    template
        .replace("{mention}", mention)
        .replace("{name}", name)
        .replace("{class}", class)
}
