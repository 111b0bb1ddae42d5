//! 쿼리 파라미터 인코더/디코더.
//!
//! 태그 필터용 대괄호 방언(`tags[host]=a&tags[host]=b`)과
//! 일반 중첩 파라미터(`names[]=a`, `opts[key]=v`)를 지원한다.
//! 키 이름과 값은 form-urlencoded 로 이스케이프하고 대괄호 문법은 그대로 둔다.

use url::form_urlencoded;

/// 태그 방언을 활성화하는 키
pub const TAGS_KEY: &str = "tags";

/// 순서가 보존되는 최상위 쿼리 파라미터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, ParamValue)>,
}

/// 최상위 파라미터 값
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// 단일 값 (`key=value`)
    Single(String),
    /// 반복 값 (`key[]=a&key[]=b`)
    Multi(Vec<String>),
    /// 한 단계 중첩 (`key[sub]=value`)
    Nested(TagParams),
}

/// 한 단계 중첩 파라미터 (주로 태그)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagParams {
    pairs: Vec<(String, TagValue)>,
}

/// 중첩 파라미터 값 — 더 깊은 중첩은 표현할 수 없다
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Single(String),
    Multi(Vec<String>),
}

impl TagValue {
    /// 인코딩 순서대로 값 나열
    pub fn values(&self) -> &[String] {
        match self {
            TagValue::Single(v) => std::slice::from_ref(v),
            TagValue::Multi(vs) => vs,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            TagValue::Single(old) => {
                let old = std::mem::take(old);
                *self = TagValue::Multi(vec![old, value]);
            }
            TagValue::Multi(vs) => vs.push(value),
        }
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// 값 설정. 이미 있는 키는 위치를 유지한 채 덮어쓴다.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// 키가 없을 때만 설정
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.pairs.push((key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `key[]=value` 디코딩 — 기존 단일 값은 배열로 승격
    fn push_multi(&mut self, key: String, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => match slot {
                ParamValue::Multi(vs) => vs.push(value),
                ParamValue::Single(old) => {
                    let old = std::mem::take(old);
                    *slot = ParamValue::Multi(vec![old, value]);
                }
                ParamValue::Nested(_) => *slot = ParamValue::Multi(vec![value]),
            },
            None => self.pairs.push((key, ParamValue::Multi(vec![value]))),
        }
    }

    /// 중첩 맵 조회/생성. 중첩이 아닌 기존 값은 빈 맵으로 교체된다.
    fn nested_mut(&mut self, key: String) -> &mut TagParams {
        let idx = match self.pairs.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                if !matches!(self.pairs[idx].1, ParamValue::Nested(_)) {
                    self.pairs[idx].1 = ParamValue::Nested(TagParams::new());
                }
                idx
            }
            None => {
                self.pairs.push((key, ParamValue::Nested(TagParams::new())));
                self.pairs.len() - 1
            }
        };
        match &mut self.pairs[idx].1 {
            ParamValue::Nested(nested) => nested,
            _ => unreachable!("nested slot was just ensured"),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl TagParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 값 설정 (기존 키 덮어쓰기)
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// 값 추가 — 두 번째 등장부터 배열로 누적
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => slot.push(value),
            None => self.pairs.push((key, TagValue::Single(value))),
        }
    }

    fn push_multi(&mut self, key: String, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => slot.push(value),
            None => self.pairs.push((key, TagValue::Multi(vec![value]))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for TagParams
where
    K: Into<String>,
    V: Into<TagValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = TagParams::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Single(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Single(v.to_string())
    }
}

macro_rules! impl_numeric_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Single(v.to_string())
            }
        })*
    };
}

impl_numeric_param!(i32, i64, u32, u64, usize);

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::Multi(v)
    }
}

impl From<TagParams> for ParamValue {
    fn from(v: TagParams) -> Self {
        ParamValue::Nested(v)
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Single(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Single(v.to_string())
    }
}

impl From<Vec<String>> for TagValue {
    fn from(v: Vec<String>) -> Self {
        TagValue::Multi(v)
    }
}

impl From<Vec<&str>> for TagValue {
    fn from(v: Vec<&str>) -> Self {
        TagValue::Multi(v.into_iter().map(str::to_string).collect())
    }
}

/// 파라미터 → 쿼리 문자열
///
/// `tags` 키가 있으면 태그 방언, 없으면 일반 중첩 인코딩을 사용한다.
pub fn encode(params: &Params) -> String {
    let dialect = if params.contains_key(TAGS_KEY) {
        Dialect::Tags
    } else {
        Dialect::Nested
    };

    let mut pairs = Vec::new();
    for (key, value) in params.iter() {
        let key = escape(key);
        match value {
            ParamValue::Single(v) => pairs.push(pair(&key, v)),
            ParamValue::Multi(vs) => {
                let key = format!("{key}[]");
                pairs.extend(vs.iter().map(|v| pair(&key, v)));
            }
            ParamValue::Nested(nested) => {
                for (sub, tag_value) in nested.iter() {
                    let nested_key = match (dialect, tag_value) {
                        (Dialect::Nested, TagValue::Multi(_)) => {
                            format!("{key}[{}][]", escape(sub))
                        }
                        _ => format!("{key}[{}]", escape(sub)),
                    };
                    pairs.extend(tag_value.values().iter().map(|v| pair(&nested_key, v)));
                }
            }
        }
    }
    pairs.join("&")
}

/// 쿼리 문자열 → 파라미터
///
/// 같은 `outer[inner]` 쌍이 반복되면 두 번째부터 배열로 누적한다.
/// 두 단계를 넘는 대괄호는 무시한다.
///
/// 대괄호 분리는 이스케이프된 원문에서 먼저 하고, 각 조각을 따로 디코딩한다.
/// 그래서 `tags[a%5Db]` 는 태그 키 `a]b` 가 된다.
pub fn decode(query: &str) -> Params {
    let mut params = Params::new();
    let query = query.strip_prefix('?').unwrap_or(query);

    for raw in query.split('&').filter(|raw| !raw.is_empty()) {
        let (raw_key, raw_value) = raw.split_once('=').unwrap_or((raw, ""));
        let (outer, subkeys) = split_key(raw_key);
        let outer = unescape(outer);
        let subkeys: Vec<String> = subkeys.into_iter().map(unescape).collect();
        let value = unescape(raw_value);

        match subkeys.as_slice() {
            [] => params.insert(outer, value),
            [first, ..] if first.is_empty() => params.push_multi(outer, value),
            [inner, rest @ ..] => {
                let nested = params.nested_mut(outer);
                if rest.first().is_some_and(|s| s.is_empty()) {
                    nested.push_multi(inner.clone(), value);
                } else {
                    nested.append(inner.as_str(), value);
                }
            }
        }
    }
    params
}

#[derive(Debug, Clone, Copy)]
enum Dialect {
    Tags,
    Nested,
}

fn escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// form-urlencoded 조각 하나 디코딩 (`+` → 공백)
fn unescape(s: &str) -> String {
    // `=` 를 앞에 붙여 조각 전체를 값으로 읽는다
    form_urlencoded::parse(format!("={s}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn pair(key: &str, value: &str) -> String {
    format!("{key}={}", escape(value))
}

/// `a[b][c]` → (`a`, [`b`, `c`]). 닫히지 않은 대괄호는 평탄 키로 취급.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    if open == 0 {
        return (key, Vec::new());
    }

    let outer = &key[..open];
    let mut rest = &key[open..];
    let mut subkeys = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key, Vec::new());
        };
        subkeys.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key, Vec::new());
    }
    (outer, subkeys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_tag() -> Params {
        let mut params = Params::new();
        params.insert("resolution", "3600");
        params.insert("duration", "60");
        params.insert(TAGS_KEY, TagParams::from_iter([("hostname", "app1")]));
        params
    }

    fn multi_tag() -> Params {
        let mut params = Params::new();
        params.insert("resolution", "3600");
        params.insert("duration", "60");
        params.insert(
            TAGS_KEY,
            TagParams::from_iter([("hostname", vec!["app1", "app2"])]),
        );
        params
    }

    #[test]
    fn encode_single_value_tag() {
        assert_eq!(
            encode(&single_tag()),
            "resolution=3600&duration=60&tags[hostname]=app1"
        );
    }

    #[test]
    fn encode_array_value_tag() {
        assert_eq!(
            encode(&multi_tag()),
            "resolution=3600&duration=60&tags[hostname]=app1&tags[hostname]=app2"
        );
    }

    #[test]
    fn decode_single_value_tag() {
        let decoded = decode("resolution=3600&duration=60&tags[hostname]=app1");
        assert_eq!(decoded, single_tag());
    }

    #[test]
    fn decode_array_value_tag() {
        let decoded =
            decode("resolution=3600&duration=60&tags[hostname]=app1&tags[hostname]=app2");
        assert_eq!(decoded, multi_tag());
    }

    #[test]
    fn decode_three_duplicates_keeps_appending() {
        let decoded = decode("tags[host]=a&tags[host]=b&tags[host]=c&tags[env]=prod");
        let Some(ParamValue::Nested(tags)) = decoded.get("tags") else {
            panic!("tags 중첩 맵이 없음");
        };
        assert_eq!(
            tags.get("host"),
            Some(&TagValue::Multi(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
        assert_eq!(tags.get("env"), Some(&TagValue::Single("prod".to_string())));
    }

    #[test]
    fn round_trip_with_multiple_tag_keys() {
        let mut params = Params::new();
        params.insert("resolution", 60u32);
        params.insert(
            TAGS_KEY,
            TagParams::from_iter([
                ("region", TagValue::from("us-east-1")),
                ("hostname", TagValue::from(vec!["web-1", "web-2", "web-3"])),
            ]),
        );
        assert_eq!(decode(&encode(&params)), params);
    }

    #[test]
    fn tag_keys_with_brackets_round_trip() {
        let mut params = Params::new();
        params.insert(
            TAGS_KEY,
            TagParams::from_iter([
                ("a]b", TagValue::from("x")),
                ("c[d", TagValue::from(vec!["y", "z"])),
                ("[e]", TagValue::from("w v")),
            ]),
        );

        let encoded = encode(&params);
        assert_eq!(
            encoded,
            "tags[a%5Db]=x&tags[c%5Bd]=y&tags[c%5Bd]=z&tags[%5Be%5D]=w+v"
        );
        assert_eq!(decode(&encoded), params);
    }

    #[test]
    fn escaped_equals_and_brackets_in_values() {
        let decoded = decode("q=a%3Db%5B1%5D&raw=x=y");
        assert_eq!(decoded.get("q"), Some(&ParamValue::Single("a=b[1]".to_string())));
        assert_eq!(decoded.get("raw"), Some(&ParamValue::Single("x=y".to_string())));
    }

    #[test]
    fn escapes_reserved_characters() {
        let mut params = Params::new();
        params.insert("tags_search", "environment=!staging");
        params.insert(TAGS_KEY, TagParams::from_iter([("name", "a b&c")]));

        let encoded = encode(&params);
        assert_eq!(
            encoded,
            "tags_search=environment%3D%21staging&tags[name]=a+b%26c"
        );
        assert_eq!(decode(&encoded), params);
    }

    #[test]
    fn generic_encoding_without_tags() {
        let mut params = Params::new();
        params.insert("names", vec!["foo".to_string(), "bar".to_string()]);
        params.insert("offset", 0u64);
        params.insert(
            "filter",
            TagParams::from_iter([("env", TagValue::from(vec!["prod"]))]),
        );

        let encoded = encode(&params);
        assert_eq!(encoded, "names[]=foo&names[]=bar&offset=0&filter[env][]=prod");
        assert_eq!(decode(&encoded), params);
    }

    #[test]
    fn empty_params_encode_to_empty_string() {
        assert_eq!(encode(&Params::new()), "");
        assert!(decode("").is_empty());
    }

    #[test]
    fn no_trailing_ampersand() {
        let encoded = encode(&single_tag());
        assert!(!encoded.ends_with('&'));
    }

    #[test]
    fn deeper_brackets_use_first_two_segments() {
        let decoded = decode("tags[host][extra]=a");
        let Some(ParamValue::Nested(tags)) = decoded.get("tags") else {
            panic!("tags 중첩 맵이 없음");
        };
        assert_eq!(tags.get("host"), Some(&TagValue::Single("a".to_string())));
    }

    #[test]
    fn malformed_brackets_stay_flat() {
        let decoded = decode("tags[host=a");
        assert_eq!(
            decoded.get("tags[host"),
            Some(&ParamValue::Single("a".to_string()))
        );
    }

    #[test]
    fn insert_keeps_position() {
        let mut params = Params::new();
        params.insert("a", "1");
        params.insert("b", "2");
        params.insert("a", "3");
        assert_eq!(encode(&params), "a=3&b=2");
    }
}
