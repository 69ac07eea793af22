use url::form_urlencoded;

/// Query-string parameters, keyed in first-seen order. A key keeps every
/// value it was given, in order.
///
/// Parsing is lenient: `+` decodes to a space, bad percent escapes pass
/// through untouched and invalid UTF-8 is replaced. Pairs with an empty
/// value (`a=` or a bare `a`) are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params = QueryParams::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            params.push(key.into_owned(), value.into_owned());
        }
        params
    }

    fn push(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every (key, value) pair, keys in first-seen order.
    pub fn pairs(&self) -> impl Iterator<Item=(&str, &str)> {
        self.entries.iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
