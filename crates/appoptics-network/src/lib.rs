//! # appoptics-network
//!
//! AppOptics REST API 네트워크 어댑터.
//!
//! ## 구조
//!
//! - [`http_connection`] — reqwest 기반 `Connection` 구현 (Basic 인증, 재시도)
//! - [`persister`] — 배치를 `v1/measurements` 로 보내는 `Persister` 구현
//! - [`client`] — 인증/조회/관리/전송 클라이언트
//! - [`annotator`] — 어노테이션 스트림/이벤트 API
//! - [`collection`] — 페이지네이션 목록 조회

pub mod annotator;
pub mod client;
pub mod collection;
pub mod http_connection;
pub mod persister;

pub use annotator::Annotator;
pub use client::Client;
pub use http_connection::HttpConnection;
pub use persister::DirectPersister;
