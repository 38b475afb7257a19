use askama::Result;

// Custom filter to format integer minor units as a money string.
// This allows us to use `|money` on cent amounts in the email templates.
pub fn money(cents: &i64) -> Result<String> {
    let sign = if *cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = abs / 100;
    let fraction = abs % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    Ok(format!("{}{}.{:02}", sign, grouped, fraction))
}

#[cfg(test)]
mod tests {
    use super::money;

    #[test]
    fn formats_cents_with_grouping() {
        assert_eq!(money(&0).unwrap(), "0.00");
        assert_eq!(money(&5).unwrap(), "0.05");
        assert_eq!(money(&3890).unwrap(), "38.90");
        assert_eq!(money(&123456789).unwrap(), "1,234,567.89");
        assert_eq!(money(&-155600).unwrap(), "-1,556.00");
    }
}
