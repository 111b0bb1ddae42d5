//! 포트 인터페이스 (trait).
//!
//! 큐와 클라이언트가 의존하는 외부 협력자 경계.
//! 구현은 `appoptics-network` crate 에 있고, 테스트에서는 mock 으로 대체한다.
//!
//! 모든 async trait은 `async_trait` 매크로를 사용하여
//! `Arc<dyn T>` 형태로 주입할 수 있게 한다.

pub mod clock;
pub mod connection;
pub mod persister;
