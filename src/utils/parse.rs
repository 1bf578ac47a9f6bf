//! 命令行数值解析

/// 按 C `strtol(.., 0)` 的规则解析 32 位无符号数:
/// `0x` 前缀为十六进制，以 `0` 开头为八进制，其余为十进制
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let digits = s.strip_prefix('+').unwrap_or(s);
    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return Err(format!("无法解析数值: '{}'", s));
    }
    u32::from_str_radix(body, radix).map_err(|e| format!("无法解析数值 '{}': {}", s, e))
}
