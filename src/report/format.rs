//! Number formatting for report fields.

/// Group digits in threes with `,`: `1234567` -> `1,234,567`.
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// One digit after the decimal point: `4.75` -> `4.8`.
pub fn one_decimal(value: f64) -> String {
    format!("{:.1}", value)
}
