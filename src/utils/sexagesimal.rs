/// Formats value (hours or degrees) as `[-]HH:MM:SS.s`.
/// `sec_digits` is number of digits after seconds point (0..=2)
pub fn value_to_sexagesimal(value: f64, zero: bool, sec_digits: u8) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let sec_digits = sec_digits.min(2);
    let scale = 10_u64.pow(sec_digits as u32);
    let total = (value.abs() * 3600.0 * scale as f64).round() as u64;
    let frac = total % scale;
    let seconds = (total / scale) % 60;
    let minutes = (total / scale / 60) % 60;
    let int = total / scale / 3600;
    let int_str = if zero { format!("{:02}", int) } else { int.to_string() };
    match sec_digits {
        0 => format!("{}{}:{:02}:{:02}", sign, int_str, minutes, seconds),
        1 => format!("{}{}:{:02}:{:02}.{}", sign, int_str, minutes, seconds, frac),
        _ => format!("{}{}:{:02}:{:02}.{:02}", sign, int_str, minutes, seconds, frac),
    }
}

#[test]
fn test_value_to_sexagesimal() {
    assert_eq!(value_to_sexagesimal(10.5, true, 0), "10:30:00");
    assert_eq!(value_to_sexagesimal(1.5, true, 0), "01:30:00");
    assert_eq!(value_to_sexagesimal(1.5, false, 0), "1:30:00");
    assert_eq!(value_to_sexagesimal(-12.508333333, true, 1), "-12:30:30.0");
    assert_eq!(value_to_sexagesimal(23.999999999, true, 1), "24:00:00.0");
    assert_eq!(value_to_sexagesimal(0.25, true, 2), "00:15:00.00");
}

/// Parses `[+-]D:M[:S[.s]]`, `[+-]D:M.m` or plain decimal value
pub fn sexagesimal_to_value(text: &str) -> Option<f64> {
    use once_cell::sync::OnceCell;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    static RE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^([+-]?)(\d+):(\d+(?:\.\d+)?)(?::(\d+(?:\.\d+)?))?$").unwrap()
    });

    let Some(res) = re.captures(text) else {
        return text.parse::<f64>().ok();
    };

    let is_neg = &res[1] == "-";
    let int = res[2].parse::<f64>().ok()?;
    let minutes = res[3].parse::<f64>().ok()?;
    let seconds = match res.get(4) {
        Some(sec) => {
            // minutes must be integer when seconds are present
            if res[3].contains('.') { return None; }
            sec.as_str().parse::<f64>().ok()?
        }
        None => 0.0,
    };
    let value = int + minutes / 60.0 + seconds / 3600.0;
    Some(if is_neg { -value } else { value })
}

#[test]
fn test_sexagesimal_to_value() {
    assert!(sexagesimal_to_value("").is_none());
    assert!(sexagesimal_to_value("abc").is_none());
    assert!(sexagesimal_to_value("1:00").unwrap() == 1.0);
    assert!(sexagesimal_to_value("-1:00").unwrap() == -1.0);
    assert!(sexagesimal_to_value("+10:30").unwrap() == 10.5);
    assert!(sexagesimal_to_value("-10:30").unwrap() == -10.5);
    assert!(f64::abs(sexagesimal_to_value("10:30.3").unwrap() - 10.505) < 1e-12);
    assert!(sexagesimal_to_value("10:30:00").unwrap() == 10.5);
    assert!(f64::abs(sexagesimal_to_value("10:30:30").unwrap() - 10.508333333333333) < 1e-12);
    assert!(f64::abs(sexagesimal_to_value("-00:30:30.5").unwrap() + 0.508472222) < 1e-8);
    assert!(sexagesimal_to_value("10:30.5:10").is_none());
    assert!(sexagesimal_to_value(" 45.25 ").unwrap() == 45.25);
}
