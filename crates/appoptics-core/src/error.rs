//! AppOptics 클라이언트 공통 에러 타입.
//!
//! 네트워크 어댑터와 CLI는 이 타입을 그대로 전파하거나 `anyhow`로 감싼다.

use thiserror::Error;

/// 메트릭 클라이언트 에러.
/// 인자 검증, 측정값 정규화, 전송 실패 등을 정의한다.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// 인증 정보 없이 네트워크 작업 시도
    #[error("인증 정보 없음: authenticate 후 다시 시도")]
    CredentialsMissing,

    /// 삭제/수정 대상 메트릭 이름 없음
    #[error("메트릭 이름 누락")]
    NoMetricsProvided,

    /// 잘못된 호출 형태 (인자 개수, 필수 옵션 누락 등)
    #[error("잘못된 인자: {0}")]
    InvalidArgument(String),

    /// 측정값을 표준 형태로 변환할 수 없음
    #[error("측정값 정규화 실패 — {name}: {reason}")]
    NormalizationFailure {
        /// 메트릭 이름 (외부 키)
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 허용 범위보다 오래된 측정 시각
    #[error("측정 시각 범위 초과 — {name}: {measure_time} < {minimum}")]
    InvalidMeasureTime {
        name: String,
        measure_time: i64,
        minimum: i64,
    },

    /// 인증 실패 (401)
    #[error("인증 실패: {0}")]
    Unauthorized(String),

    /// 리소스를 찾을 수 없음 (404)
    #[error("리소스 미발견: {url}: {body}")]
    NotFound {
        /// 요청 URL
        url: String,
        /// 응답 본문
        body: String,
    },

    /// 분류되지 않은 비정상 응답
    #[error("API 에러 ({status}): {body}")]
    TransportFailure {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),
}

impl MetricsError {
    /// 재시도로 회복 가능한 에러인지 판별
    ///
    /// 네트워크 단절, 429, 5xx 만 재시도 대상
    pub fn is_retryable(&self) -> bool {
        match self {
            MetricsError::Network(_) => true,
            MetricsError::TransportFailure { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 네트워크 호출 이전에 발생하는 검증 에러인지 판별
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MetricsError::NoMetricsProvided
                | MetricsError::InvalidArgument(_)
                | MetricsError::NormalizationFailure { .. }
                | MetricsError::InvalidMeasureTime { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(MetricsError::Network("timeout".to_string()).is_retryable());
        assert!(MetricsError::TransportFailure {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(MetricsError::TransportFailure {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!MetricsError::TransportFailure {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!MetricsError::CredentialsMissing.is_retryable());
        assert!(!MetricsError::Unauthorized("bad token".to_string()).is_retryable());
    }

    #[test]
    fn validation_errors() {
        assert!(MetricsError::NoMetricsProvided.is_validation());
        assert!(MetricsError::InvalidArgument("x".to_string()).is_validation());
        assert!(!MetricsError::Network("x".to_string()).is_validation());
    }

    #[test]
    fn display_messages() {
        let err = MetricsError::NormalizationFailure {
            name: "cpu".to_string(),
            reason: "value 누락".to_string(),
        };
        assert!(err.to_string().contains("cpu"));
        assert!(MetricsError::CredentialsMissing.to_string().contains("인증"));
    }
}
