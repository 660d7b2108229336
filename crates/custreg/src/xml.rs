//! Derived XML snippet for a customer record.

/// Escape the five XML reserved characters.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the fixed-shape XML stored alongside a customer.
///
/// ```
/// assert_eq!(
///     custreg::xml::customer_xml(7, "A & B"),
///     "<Customer><ID>7</ID><Name>A &amp; B</Name></Customer>"
/// );
/// ```
#[must_use]
pub fn customer_xml(id: i64, name: &str) -> String {
    format!(
        "<Customer><ID>{id}</ID><Name>{}</Name></Customer>",
        escape(name)
    )
}
