use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    Result, ScrapeflowError, ShareLock,
    store::{DbCollection, DbDocument, PageData, query::Query},
};

#[derive(Debug, Clone)]
pub struct Collect<T> {
    name: String,
    items: ShareLock<HashMap<String, T>>,
}

impl<T> Collect<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn compare(
    a: Option<&Value>,
    b: Option<&Value>,
) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), Some(v)) if !v.is_null() => Ordering::Less,
        (Some(v), None | Some(Value::Null)) if !v.is_null() => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::exists({})", self.name, id);
        Ok(self.items.read().unwrap().contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        trace!("{}::find({})", self.name, id);
        self.items.read().unwrap().get(id).cloned().ok_or_else(|| ScrapeflowError::Store(format!("{} not found: {}", self.name, id)))
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        trace!("{}::query({:?})", self.name, q);
        let items = self.items.read().unwrap();

        let mut matched: Vec<(Map<String, Value>, &T)> = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if q.filters().iter().all(|(key, value)| doc.get(key) == Some(value)) {
                matched.push((doc, item));
            }
        }

        matched.sort_by(|(a, _), (b, _)| {
            q.order_by()
                .iter()
                .map(|(key, rev)| {
                    let ord = compare(a.get(key), b.get(key));
                    if *rev { ord.reverse() } else { ord }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let count = matched.len();
        let take = if q.limit() == 0 { usize::MAX } else { q.limit() };
        let rows = matched.into_iter().skip(q.offset()).take(take).map(|(_, item)| item.clone()).collect();
        Ok(PageData::new(count, q, rows))
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::create({})", self.name, data.id());
        let mut items = self.items.write().unwrap();
        if items.contains_key(data.id()) {
            return Err(ScrapeflowError::Store(format!("{} already exists: {}", self.name, data.id())));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::update({})", self.name, data.id());
        let mut items = self.items.write().unwrap();
        match items.get_mut(data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name, id);
        Ok(self.items.write().unwrap().remove(id).is_some())
    }
}
