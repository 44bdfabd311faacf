//! 路径提取
//!
//! 从事实值中按 `$.a.b` 形式的路径取出嵌套值。路径不匹配时返回 None，
//! 由比较逻辑把缺失当作 null 处理，而不是报错。

use serde_json::Value;

/// 路径前缀
const ROOT: &str = "$";

/// 按路径提取嵌套值
///
/// - 没有路径或路径为 `$` 时返回事实值本身
/// - `$.` 前缀可省略，`totalPerimeter` 与 `$.totalPerimeter` 等价
/// - 数字段用于数组下标，如 `$.previousActions.0.date`
pub fn extract<'a>(value: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let Some(path) = path else {
        return Some(value);
    };

    let trimmed = path
        .strip_prefix("$.")
        .or_else(|| if path == ROOT { Some("") } else { None })
        .unwrap_or(path);

    if trimmed.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for part in trimmed.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// 提取并拷贝，缺失统一为 None
pub fn extract_owned(value: &Value, path: Option<&str>) -> Option<Value> {
    extract(value, path).cloned()
}
