//! Human-readable rendering of profile values.

use crate::model::UnitKind;

/// Format a value in the given unit: durations for `nanoseconds`, binary
/// sizes for `bytes`, and plain integers for everything else.
pub fn format_value(value: i64, unit: &str) -> String {
    match UnitKind::from_unit(unit) {
        UnitKind::Duration => format_nanos(value),
        UnitKind::Space => format_bytes(value),
        UnitKind::Count => value.to_string(),
    }
}

/// Signed delta: `+1.5ms`, `-2.0 KiB`, or the plain zero value.
pub fn format_delta(value: i64, unit: &str) -> String {
    let magnitude = format_value(value.unsigned_abs().min(i64::MAX as u64) as i64, unit);
    match value.signum() {
        1 => format!("+{}", magnitude),
        -1 => format!("-{}", magnitude),
        _ => magnitude,
    }
}

/// Binary sizes: `512 B`, `1.5 KiB`, `3.0 GiB`.
pub fn format_bytes(bytes: i64) -> String {
    const UNIT: u64 = 1024;
    let sign = if bytes < 0 { "-" } else { "" };
    let b = bytes.unsigned_abs();
    if b < UNIT {
        return format!("{}{} B", sign, b);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = b / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{}{:.1} {}iB", sign, b as f64 / div as f64, prefix)
}

/// Durations in the style of Go's `time.Duration`: `750ns`, `1.5µs`,
/// `12.25ms`, `2.5s`, `1m30s`, `1h0m0s`.
pub fn format_nanos(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let n = nanos.unsigned_abs();

    let body = if n < 1_000 {
        format!("{}ns", n)
    } else if n < 1_000_000 {
        format!("{}µs", decimal(n, 3))
    } else if n < 1_000_000_000 {
        format!("{}ms", decimal(n, 6))
    } else {
        let secs = n / 1_000_000_000;
        let frac = n % 1_000_000_000;
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if hours > 0 || minutes > 0 {
            out.push_str(&format!("{}m", minutes));
        }
        out.push_str(&decimal(seconds * 1_000_000_000 + frac, 9));
        out.push('s');
        out
    };
    format!("{}{}", sign, body)
}

/// Round a nanosecond count to whole milliseconds.
pub fn round_to_millis(nanos: i64) -> i64 {
    let rem = nanos % 1_000_000;
    let base = nanos - rem;
    if rem.abs() >= 500_000 {
        base + 1_000_000 * rem.signum()
    } else {
        base
    }
}

/// Share of `total`, as shown in list descriptions.
///
/// A zero total reads `100.0%`, a zero value reads empty, and tiny shares
/// read `<0.1%`.
pub fn format_percent(value: i64, total: i64) -> String {
    if total == 0 {
        return "100.0%".to_string();
    }
    if value == 0 {
        return String::new();
    }
    let percent = value as f64 / total as f64 * 100.0;
    if percent < 0.1 {
        return "<0.1%".to_string();
    }
    format!("{:.1}%", percent)
}

/// `value` with `digits` implied decimal places, trailing zeros trimmed.
fn decimal(value: u64, digits: u32) -> String {
    let scale = 10u64.pow(digits);
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
