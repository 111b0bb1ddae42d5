//! # appoptics-core
//!
//! AppOptics 메트릭 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 네트워크와 무관한 핵심 로직(배치 큐, 정규화, 쿼리 인코딩)을 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 측정값/조회 옵션/어노테이션 (serde Serialize/Deserialize)
//! - [`ports`] — 연결, 전송, 시각 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 클라이언트 설정 구조체
//! - [`params`] — 중첩 쿼리 파라미터 인코더/디코더
//! - [`normalizer`] — 측정값 입력 정규화
//! - [`queue`] — 측정값 배치 큐

pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod params;
pub mod ports;
pub mod queue;
