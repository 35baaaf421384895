// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use record_import::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息；key 不存在时返回 None
///
/// rust-i18n 对缺失的 key 原样返回 key 本身（部分版本带 locale 前缀）
pub fn try_t(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let translated = t(key);
    let prefixed = format!("{}.{}", current_locale(), key);
    if translated == key || translated == prefixed {
        None
    } else {
        Some(translated)
    }
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use record_import::i18n::t_with_args;
/// let msg = t_with_args("import.invalid_target", &[("table", "fe_users")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
