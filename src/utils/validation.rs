//! 输入验证工具函数
//!
//! 登录与纠错前对用户输入做基础校验

/// 可选的垃圾桶
pub const WASTE_BINS: [(&str, &str); 8] = [
    ("1", "Bin 1"),
    ("2", "Bin 2"),
    ("3", "Bin 3"),
    ("4", "Bin 4"),
    ("5", "Bin 5"),
    ("6", "Bin 6"),
    ("7", "Bin 7"),
    ("8", "Bin 8"),
];

/// 纠错时提供的预设类别（也允许自定义标签）
pub const WASTE_CATEGORIES: [&str; 13] = [
    "plastic",
    "paper",
    "cardboard",
    "glass",
    "metal",
    "organic",
    "fabric",
    "rubber",
    "wood",
    "ceramic",
    "electronic",
    "hazardous",
    "other",
];

/// 查找垃圾桶名称
pub fn bin_name(id: &str) -> Option<&'static str> {
    WASTE_BINS
        .iter()
        .find(|(bin_id, _)| *bin_id == id)
        .map(|(_, name)| *name)
}

/// 验证纠正标签
///
/// # 返回
/// - `Ok(String)`: 去除首尾空白后的标签
/// - `Err(String)`: 错误信息
pub fn validate_label(label: &str) -> Result<String, String> {
    let label = label.trim();
    if label.is_empty() {
        return Err("标签不能为空".to_string());
    }
    Ok(label.to_string())
}

/// 是否为预设类别
pub fn is_known_category(label: &str) -> bool {
    WASTE_CATEGORIES.contains(&label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_lookup() {
        assert_eq!(bin_name("4"), Some("Bin 4"));
        assert_eq!(bin_name("9"), None);
        assert_eq!(bin_name(""), None);
    }

    #[test]
    fn test_validate_label() {
        assert_eq!(validate_label("  glass ").unwrap(), "glass");
        assert!(validate_label("   ").is_err());
        assert!(is_known_category("hazardous"));
        assert!(!is_known_category("styrofoam"));
    }
}
