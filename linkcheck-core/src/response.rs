use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use http::HeaderMap;

/// An HTTP response as seen by the validation engine.
///
/// Decoded forms of the body (an HTML document, a GitHub blob's decoded
/// text, or any caller-supplied type) are memoized per response so a
/// `FragmentValidator` never re-parses the same body twice: see
/// [`Response::body_as`].
pub struct Response {
    status_code: u16,
    headers: HeaderMap,
    body: Bytes,
    decoded: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl Response {
    pub fn new(status_code: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status_code,
            headers,
            body,
            decoded: RefCell::new(HashMap::new()),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive single-value header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Decode the body into `T`, caching the result so a second call with
    /// the same `T` returns the cached value without re-invoking `decoder`.
    /// A decode failure is not cached, so it can be retried with a
    /// different decoder.
    pub fn body_as<T, E>(
        &self,
        decoder: impl FnOnce(&Bytes) -> Result<T, E>,
    ) -> Result<Rc<T>, E>
    where
        T: 'static,
    {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.decoded.borrow().get(&type_id) {
            return Ok(existing
                .downcast_ref::<Rc<T>>()
                .expect("decoded cache keyed by TypeId must match T")
                .clone());
        }
        let decoded = Rc::new(decoder(&self.body)?);
        self.decoded
            .borrow_mut()
            .insert(type_id, Box::new(decoded.clone()));
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn body_as_memoizes_decode() {
        let response = Response::new(200, HeaderMap::new(), Bytes::from_static(b"hello"));
        let calls = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let decoded = response
                .body_as::<String, std::convert::Infallible>(|b| {
                    calls.set(calls.get() + 1);
                    Ok(String::from_utf8_lossy(b).to_string())
                })
                .unwrap();
            assert_eq!(&*decoded, "hello");
        }
        assert_eq!(calls.get(), 1, "decoder must run exactly once");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", "30".parse().unwrap());
        let response = Response::new(429, headers, Bytes::new());
        assert_eq!(response.header("retry-after"), Some("30"));
    }
}
