//! 请求签名原语
//!
//! 提供规范字符串构造、HMAC-SHA256 签名与校验。
//!
//! 规范字符串格式（字段定长、顺序固定、`|` 分隔）：
//!
//! ```text
//! {METHOD}|{PATH}|{BODY}|{DEVICE_ID}|{NONCE}|{TIMESTAMP}
//! ```
//!
//! - `METHOD` 为大写 HTTP 动词
//! - `PATH` 为不含查询串的请求路径
//! - `BODY` 为原始请求体按 UTF-8 解码（GET 为空字符串）
//! - 设备 ID 与 nonce 是不含分隔符的不透明令牌，由注册环节保证
//!
//! 签名为 HMAC-SHA256 摘要的 base64 编码，可直接放入请求头。

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 构造规范字符串
///
/// 纯函数：相同输入永远产生相同输出。
pub fn build_canonical_string(
    method: &str,
    path: &str,
    body: &str,
    device_id: &str,
    nonce: &str,
    timestamp: &str,
) -> String {
    format!("{method}|{path}|{body}|{device_id}|{nonce}|{timestamp}")
}

/// 计算规范字符串的签名
///
/// HMAC-SHA256 摘要，base64 编码输出。
pub fn sign(canonical: &str, secret_key: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret_key).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

/// 校验签名
///
/// 重新计算期望签名并做恒定时间比较（`Mac::verify_slice`，
/// 不是 `==`），避免通过比较耗时泄露密钥信息。
/// base64 解码失败按签名不匹配处理。
pub fn verify(canonical: &str, signature: &str, secret_key: &[u8]) -> bool {
    let Ok(supplied) = BASE64_STANDARD.decode(signature) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret_key).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}
