//! tracing 구독자 초기화

use tracing_subscriber::EnvFilter;

/// `RUST_LOG`가 있으면 그 필터를, 없으면 `default_level`을 사용한다.
///
/// 이미 전역 구독자가 설치되어 있으면 아무것도 하지 않는다 (테스트에서 여러 번 호출될 수 있음).
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
