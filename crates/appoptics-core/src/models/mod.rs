//! AppOptics 도메인 모델.
//!
//! 측정값, 조회 옵션, 어노테이션 등 API 와 주고받는 데이터 구조체를 정의한다.

pub mod annotation;
pub mod measurement;
pub mod query;
