//! Standalone runtime script burned into every saved page.

use crate::resolver::ResolutionIndex;

const ARCHIVE_ID_PLACEHOLDER: &str = "{{ARCHIVE_ID}}";
const PAGE_URL_PLACEHOLDER: &str = "{{PAGE_URL}}";
const URL_MAP_PLACEHOLDER: &str = "{{URL_MAP}}";

const INTERCEPTOR_TEMPLATE: &str = r#"<script data-offline-interceptor>
(function () {
  var ARCHIVE_ID = {{ARCHIVE_ID}};
  var PAGE_URL = {{PAGE_URL}};
  var URL_MAP = {{URL_MAP}};
  var KEYS = Object.keys(URL_MAP);
  window.__ARCHIVE_ID__ = ARCHIVE_ID;
  window.__URL_MAP__ = URL_MAP;

  function stripQuery(s) { var i = s.indexOf('?'); return i < 0 ? s : s.slice(0, i); }
  function stripFragment(s) { var i = s.indexOf('#'); return i < 0 ? s : s.slice(0, i); }
  function decode(s) { try { return decodeURIComponent(s); } catch (e) { return s; } }
  function isLocal(s) { return s.indexOf('assets/') === 0; }
  function isInline(s) { return /^data:/i.test(s) || s.charAt(0) === '#'; }

  function canonicalize(reference) {
    var trimmed = reference.trim();
    if (!trimmed || /^(javascript|mailto|data):/i.test(trimmed)) return null;
    try {
      var url = new URL(trimmed.replace(/&amp;/g, '&'), PAGE_URL);
      url.hash = '';
      return url.href;
    } catch (e) {
      return null;
    }
  }

  function matchDecoded(canonical) {
    var decoded = decode(canonical);
    for (var i = 0; i < KEYS.length; i++) {
      if (decode(KEYS[i]) === decoded) return URL_MAP[KEYS[i]];
    }
    return null;
  }

  function matchPathSuffix(reference) {
    var needle = stripQuery(stripFragment(reference.trim()));
    if (!needle || needle === '/') return null;
    for (var i = 0; i < KEYS.length; i++) {
      if (stripQuery(KEYS[i]).slice(-needle.length) === needle) return URL_MAP[KEYS[i]];
    }
    return null;
  }

  function resolve(reference) {
    if (typeof reference !== 'string' || !reference.trim()) return null;
    if (isLocal(reference) || isInline(reference.trim())) return null;
    var canonical = canonicalize(reference);
    if (canonical !== null) {
      if (Object.prototype.hasOwnProperty.call(URL_MAP, canonical)) return URL_MAP[canonical];
      var decoded = matchDecoded(canonical);
      if (decoded !== null) return decoded;
    }
    return matchPathSuffix(reference);
  }

  function rewriteSrcset(value) {
    var changed = false;
    var parts = value.split(',').map(function (candidate) {
      return candidate.trim();
    }).filter(function (candidate) {
      return candidate.length > 0;
    }).map(function (candidate) {
      var match = candidate.match(/^(\S+)(?:\s+(.*))?$/);
      var url = match ? match[1] : candidate;
      var descriptor = match && match[2] ? match[2].trim() : '';
      var local = resolve(url);
      if (local !== null) { changed = true; url = local; }
      return descriptor ? url + ' ' + descriptor : url;
    });
    return changed ? parts.join(', ') : null;
  }

  function rewriteAttribute(name, value) {
    if (typeof value !== 'string') return null;
    if (name.toLowerCase() === 'srcset') return rewriteSrcset(value);
    return resolve(value.trim());
  }

  window.__ARCHIVE_RESOLVE__ = resolve;

  function isRequest(input) {
    return typeof Request !== 'undefined' && input instanceof Request;
  }

  function retarget(request, local) {
    try { return new Request(local, request); } catch (e) { return request; }
  }

  var originalFetch = window.fetch;
  if (originalFetch) {
    window.fetch = function (input, init) {
      var requested = typeof input === 'string' ? input : (input && input.url) || String(input);
      var local = resolve(requested);
      if (local === null) {
        return originalFetch.call(this, input, init);
      }
      return originalFetch.call(this, isRequest(input) ? retarget(input, local) : local, init);
    };
  }

  var originalOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    var local = resolve(String(url));
    var args = Array.prototype.slice.call(arguments);
    if (local !== null) args[1] = local;
    return originalOpen.apply(this, args);
  };

  var OBSERVED = ['src', 'srcset', 'href'];
  var observer = null;
  var options = { attributes: true, attributeFilter: OBSERVED, childList: true, subtree: true };

  function collect(element, writes) {
    if (!element || element.nodeType !== 1) return;
    for (var i = 0; i < OBSERVED.length; i++) {
      var value = element.getAttribute(OBSERVED[i]);
      if (value === null) continue;
      var local = rewriteAttribute(OBSERVED[i], value);
      if (local !== null) writes.push([element, OBSERVED[i], local]);
    }
    var children = element.children || [];
    for (var j = 0; j < children.length; j++) collect(children[j], writes);
  }

  function flush(records) {
    var writes = [];
    records.forEach(function (record) {
      if (record.type === 'attributes') {
        var value = record.target.getAttribute(record.attributeName);
        var local = value === null ? null : rewriteAttribute(record.attributeName, value);
        if (local !== null) writes.push([record.target, record.attributeName, local]);
      } else {
        record.addedNodes.forEach(function (node) { collect(node, writes); });
      }
    });
    if (!writes.length) return;
    observer.disconnect();
    writes.forEach(function (write) { write[0].setAttribute(write[1], write[2]); });
    observer.observe(document.documentElement, options);
  }

  if (window.MutationObserver) {
    observer = new MutationObserver(flush);
    observer.observe(document.documentElement, options);
  }
})();
</script>
"#;

/// Render the runtime script for one saved page.
///
/// The index is inlined as JSON with every `<` escaped so the payload cannot close the
/// surrounding script element.
pub fn render_interceptor(
  archive_id: &str,
  page_url: &str,
  index: &ResolutionIndex,
) -> Result<String, serde_json::Error> {
  let archive_id = script_safe_json(&serde_json::to_string(archive_id)?);
  let page_url = script_safe_json(&serde_json::to_string(page_url)?);
  let url_map = script_safe_json(&index.to_json()?);

  Ok(
    INTERCEPTOR_TEMPLATE
      .replace(ARCHIVE_ID_PLACEHOLDER, &archive_id)
      .replace(PAGE_URL_PLACEHOLDER, &page_url)
      .replace(URL_MAP_PLACEHOLDER, &url_map),
  )
}

fn script_safe_json(json: &str) -> String {
  json.replace('<', "\\u003c")
}

#[cfg(test)]
mod tests {
  use boa_engine::{Context, JsArgs, JsResult, JsString, JsValue, NativeFunction, Source, js_string};
  use url::Url;

  use super::*;
  use crate::interceptor::RuntimeInterceptor;
  use crate::resolver::fixtures::{PAGE, captured_index};

  /// Browser globals the script touches while loading, with `URL` backed by the same
  /// WHATWG parser the Rust side uses.
  const HOST_ENV: &str = r#"
globalThis.window = globalThis;
globalThis.XMLHttpRequest = function () {};
XMLHttpRequest.prototype.open = function (method, url) { this.url = url; };
globalThis.Request = function (url, init) {
  this.url = String(url);
  this.method = (init && init.method) || 'GET';
  this.headers = (init && init.headers) || {};
};
globalThis.__fetched = null;
globalThis.fetch = function (input) { globalThis.__fetched = input; return input; };
globalThis.URL = function (input, base) {
  var href = __hostResolveUrl(String(input), String(base));
  if (href === null) throw new TypeError('Invalid URL');
  this.href = href;
};
Object.defineProperty(URL.prototype, 'hash', {
  get: function () { var i = this.href.indexOf('#'); return i < 0 ? '' : this.href.slice(i); },
  set: function (value) {
    var i = this.href.indexOf('#');
    if (i >= 0) this.href = this.href.slice(0, i);
    if (value) this.href += '#' + String(value).replace(/^#/, '');
  }
});
"#;

  fn host_resolve_url(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let input = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let base = args.get_or_undefined(1).to_string(context)?.to_std_string_escaped();
    Ok(match Url::parse(&base).and_then(|base| base.join(&input)) {
      Ok(url) => JsValue::from(JsString::from(url.as_str())),
      Err(_) => JsValue::null(),
    })
  }

  fn load_script(index: &ResolutionIndex, page_url: &str) -> Context {
    let rendered = render_interceptor("ex_com_1700000000000", page_url, index).unwrap();
    let body_start = rendered.find('>').unwrap() + 1;
    let body_end = rendered.rfind("</script>").unwrap();

    let mut context = Context::default();
    context
      .register_global_builtin_callable(
        js_string!("__hostResolveUrl"),
        2,
        NativeFunction::from_fn_ptr(host_resolve_url),
      )
      .unwrap();
    context.eval(Source::from_bytes(HOST_ENV)).unwrap();
    context
      .eval(Source::from_bytes(&rendered[body_start..body_end]))
      .unwrap();
    context
  }

  fn eval_string(context: &mut Context, code: &str) -> Option<String> {
    let value = context.eval(Source::from_bytes(code)).unwrap();
    if value.is_null() {
      return None;
    }
    Some(value.to_string(context).unwrap().to_std_string_escaped())
  }

  fn script_resolve(context: &mut Context, reference: &str) -> Option<String> {
    let literal = serde_json::to_string(reference).unwrap();
    eval_string(context, &format!("window.__ARCHIVE_RESOLVE__({literal})"))
  }

  #[test]
  fn script_resolver_agrees_with_runtime_model() {
    let mut index = captured_index();
    index.insert("https://ex.com/a/caf%C3%A9.png", "assets/media/cafe_77777777.png");
    index.insert("https://ex.com/a/50%zz.png", "assets/media/50_zz_88888888.png");
    let mut context = load_script(&index, PAGE);
    let interceptor = RuntimeInterceptor::new(&index, PAGE);

    for reference in [
      "/logo.png",
      "../logo.png",
      "https://ex.com/logo.png#top",
      "https://ex.com/logo.png?v=2",
      "/_next/image?url=https://ex.com/a.png&w=640",
      "/media/my photo.jpg",
      "/a/caf%c3%a9.png",
      "/a/50%zz.png?x=1",
      "%E0%A4%A",
      "css/site.css?v=7",
      "/css/site.css?v=8",
      "js/app.js",
      "/api/items?page=9",
      "https://other.org/unknown.js",
      "assets/media/logo_11111111.png",
      "/",
      "",
      "   ",
      "#top",
      "data:image/png;base64,AA",
      "javascript:alert(1)",
      "mailto:a@b.c",
    ] {
      assert_eq!(
        script_resolve(&mut context, reference).as_deref(),
        interceptor.resolve_request(reference),
        "{reference:?}"
      );
    }
  }

  #[test]
  fn script_resolver_rejects_root_needles_and_survives_bad_escapes() {
    let index: ResolutionIndex = [
      ("https://ex.com/", "assets/api/data_1.json"),
      ("https://ex.com/a/%E0%A4%A.json", "assets/api/data_2.json"),
    ]
    .into_iter()
    .collect();
    let page_url = "http://localhost:3000/view/ex_com_1/index.html";
    let mut context = load_script(&index, page_url);
    let interceptor = RuntimeInterceptor::new(&index, page_url);

    for reference in ["/", "/a/%E0%A4%A.json?x=1"] {
      assert_eq!(
        script_resolve(&mut context, reference).as_deref(),
        interceptor.resolve_request(reference),
        "{reference:?}"
      );
    }
    assert_eq!(script_resolve(&mut context, "/"), None);
    assert_eq!(
      script_resolve(&mut context, "/a/%E0%A4%A.json?x=1").as_deref(),
      Some("assets/api/data_2.json")
    );
  }

  #[test]
  fn fetch_keeps_request_options_when_redirected() {
    let mut context = load_script(&captured_index(), PAGE);
    eval_string(
      &mut context,
      "window.fetch(new Request('/logo.png', { method: 'POST', headers: { a: '1' } })); null",
    );
    assert_eq!(
      eval_string(
        &mut context,
        "__fetched instanceof Request ? __fetched.url + ' ' + __fetched.method : null",
      )
      .as_deref(),
      Some("assets/media/logo_11111111.png POST")
    );

    eval_string(&mut context, "window.fetch('/not-captured.js'); null");
    assert_eq!(
      eval_string(&mut context, "String(__fetched)").as_deref(),
      Some("/not-captured.js")
    );
  }

  #[test]
  fn inlines_index_and_identity() {
    let index: ResolutionIndex = [("https://ex.com/a.css", "assets/css/a_1.css")]
      .into_iter()
      .collect();
    let script = render_interceptor("ex_com_1700000000000", "https://ex.com/", &index).unwrap();

    assert!(script.contains(r#"var ARCHIVE_ID = "ex_com_1700000000000";"#));
    assert!(script.contains(r#"var PAGE_URL = "https://ex.com/";"#));
    assert!(script.contains(r#"var URL_MAP = {"https://ex.com/a.css":"assets/css/a_1.css"};"#));
    assert!(!script.contains("{{"));
  }

  #[test]
  fn markup_inside_the_index_cannot_close_the_script() {
    let index: ResolutionIndex = [(
      "https://ex.com/api?q=</script><script>alert(1)</script>",
      "assets/api/data_1.json",
    )]
    .into_iter()
    .collect();
    let script = render_interceptor("id", "https://ex.com/", &index).unwrap();

    assert_eq!(script.matches("</script>").count(), 1);
    assert!(script.contains(r"\u003c/script>\u003cscript>"));
  }

  #[test]
  fn exposes_globals_and_wraps_network_primitives() {
    let script = render_interceptor("id", "https://ex.com/", &ResolutionIndex::new()).unwrap();
    for needle in [
      "window.__ARCHIVE_ID__ = ARCHIVE_ID;",
      "window.__URL_MAP__ = URL_MAP;",
      "window.fetch = function",
      "XMLHttpRequest.prototype.open = function",
      "observer.disconnect();",
    ] {
      assert!(script.contains(needle), "missing {needle}");
    }
  }
}
