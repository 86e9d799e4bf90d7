use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::store::{Store, data::Template};

use super::{HttpMethod, ResolvedRequest, decode_form, encode_form, is_form_content};

/// Merges `template` with caller parameters and resolves its attachments into a concrete request.
///
/// Caller keys overwrite matching keys in the default params and in a mapping body. New keys go to the body
/// for POST requests whose body is a mapping or empty, and to the query params otherwise. A urlencoded text
/// body is decoded for the merge and encoded again afterwards. The template itself is never modified.
pub fn compile(
    template: &Template,
    user_params: &Map<String, Value>,
    store: &Store,
) -> ResolvedRequest {
    let mut params = template.default_params.clone();
    let form = is_form_content(&template.headers);

    let (mut body, form_body) = match &template.body {
        Value::String(text) if form => (Value::Object(decode_form(text)), true),
        other => (other.clone(), false),
    };

    for (key, value) in user_params {
        let in_params = params.contains_key(key);
        let in_body = body.as_object().is_some_and(|b| b.contains_key(key));
        if in_params {
            params.insert(key.clone(), value.clone());
        }
        if in_body && let Some(b) = body.as_object_mut() {
            b.insert(key.clone(), value.clone());
        }
        if in_params || in_body {
            continue;
        }

        if template.method == HttpMethod::POST && body.is_null() {
            body = Value::Object(Map::new());
        }
        match (template.method, body.as_object_mut()) {
            (HttpMethod::POST, Some(b)) => {
                b.insert(key.clone(), value.clone());
            }
            _ => {
                params.insert(key.clone(), value.clone());
            }
        }
    }

    if form_body && let Value::Object(b) = &body {
        body = Value::String(encode_form(b));
    }

    let mut request = ResolvedRequest {
        url: template.url.clone(),
        method: template.method,
        headers: template.headers.clone(),
        params,
        body,
        proxy: None,
    };

    if let Some(proxy_id) = &template.proxy_id {
        request.proxy = resolve_proxy(store, proxy_id, "template");
    }
    attach(template, store, &mut request);
    request
}

/// Header group first, cookie only when no header group is referenced.
fn attach(
    template: &Template,
    store: &Store,
    request: &mut ResolvedRequest,
) {
    if let Some(group_id) = &template.header_group_id {
        match store.header_groups().find(group_id) {
            Ok(group) => {
                request.headers.extend(group.headers);
                if let Some(proxy) = group.proxy_id.as_deref().and_then(|id| resolve_proxy(store, id, "header_group")) {
                    request.proxy = Some(proxy);
                }
            }
            Err(e) => warn!(attachment = "header_group", id = %group_id, template = %template.name, error = %e, "attachment lookup failed, skipping"),
        }
    } else if let Some(cookie_id) = &template.cookie_id {
        match store.cookies().find(cookie_id) {
            Ok(cookie) => {
                request.headers.insert("Cookie".to_string(), cookie.cookie_text);
                if let Some(proxy) = cookie.proxy_id.as_deref().and_then(|id| resolve_proxy(store, id, "cookie")) {
                    request.proxy = Some(proxy);
                }
            }
            Err(e) => warn!(attachment = "cookie", id = %cookie_id, template = %template.name, error = %e, "attachment lookup failed, skipping"),
        }
    }
}

fn resolve_proxy(
    store: &Store,
    proxy_id: &str,
    owner: &str,
) -> Option<String> {
    match store.proxies().find(proxy_id) {
        Ok(proxy) => {
            let url = proxy.url();
            if url.is_none() {
                debug!(attachment = "proxy", id = proxy_id, owner, "proxy disabled, ignoring");
            }
            url
        }
        Err(e) => {
            warn!(attachment = "proxy", id = proxy_id, owner, error = %e, "attachment lookup failed, skipping");
            None
        }
    }
}
