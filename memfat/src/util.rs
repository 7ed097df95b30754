use std::time::{SystemTime, UNIX_EPOCH};

/// 当前的Unix时间，单位为秒。时钟早于1970年时记为0。
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
