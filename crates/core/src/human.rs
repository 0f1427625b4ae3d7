/// Integer with `,` thousands separators, e.g. `12,345`.
pub fn group_thousands(n: impl Into<f64>) -> String {
    let n: f64 = n.into();
    let rounded = n.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
