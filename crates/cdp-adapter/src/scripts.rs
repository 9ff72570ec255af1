//! Page-side helper bundle.
//!
//! Every adapter call evaluates one expression: the bundle installs
//! `window.__sutianAutoplay` if the current document does not have it yet,
//! then a single method on it is invoked with JSON arguments. Elements are
//! handed to Rust as `data-autoplay-ref` tags; refs starting with `h` live
//! inside the host iframe, everything else in the top document.

use serde::Serialize;
use serde_json::Value;

/// Global the bundle installs itself under.
pub const GLOBAL: &str = "__sutianAutoplay";

/// Id of the fixed control panel.
pub const PANEL_ID: &str = "auto-play-controls-container";

/// Operations exposed by the bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Scan,
    VariantLinks,
    ElementBox,
    ScrollIntoView,
    SetVisual,
    Activate,
    OpenHost,
    HostUrl,
    HostTriggers,
    CloseHost,
    NextPageHref,
    ReplaceUrl,
    ProbeDuration,
    InstallControls,
    RenderControls,
    ShowNotice,
    DrainCommands,
}

impl Op {
    pub fn method(&self) -> &'static str {
        match self {
            Op::Scan => "scan",
            Op::VariantLinks => "variantLinks",
            Op::ElementBox => "elementBox",
            Op::ScrollIntoView => "scrollIntoView",
            Op::SetVisual => "setVisual",
            Op::Activate => "activate",
            Op::OpenHost => "openHost",
            Op::HostUrl => "hostUrl",
            Op::HostTriggers => "hostTriggers",
            Op::CloseHost => "closeHost",
            Op::NextPageHref => "nextPageHref",
            Op::ReplaceUrl => "replaceUrl",
            Op::ProbeDuration => "probeDuration",
            Op::InstallControls => "installControls",
            Op::RenderControls => "renderControls",
            Op::ShowNotice => "showNotice",
            Op::DrainCommands => "drainCommands",
        }
    }
}

/// Build the expression that runs `op` with `selectors` and `args`.
pub fn call(op: Op, selectors: &impl Serialize, args: &Value) -> String {
    let selectors = serde_json::to_string(selectors).unwrap_or_else(|_| "{}".into());
    format!(
        "(() => {{ {bundle}; return window.{global}.{method}({selectors}, {args}); }})()",
        bundle = BUNDLE,
        global = GLOBAL,
        method = op.method(),
        selectors = selectors,
        args = args,
    )
}

const BUNDLE: &str = r#"
if (!window.__sutianAutoplay) {
  window.__sutianAutoplay = (function () {
    const REF = 'data-autoplay-ref';
    const HOST_ID = 'sutian-autoplay-host';
    const PANEL_ID = 'auto-play-controls-container';
    const STYLE_ID = 'sutian-autoplay-style';
    const NOTICE_ID = 'sutian-autoplay-notice';
    const ROW_BUTTON = 'userscript-row-play-button';
    const CLASSES = {
      active: 'userscript-row-highlight',
      paused: 'userscript-row-paused',
      now_playing: 'userscript-audio-playing',
    };
    const STYLE = `
      .userscript-row-highlight { background-color: rgba(0, 255, 0, 0.1) !important; transition: background-color 0.5s ease-out; }
      .userscript-row-paused { animation: sutian-autoplay-blink 1s ease-in-out infinite; background-color: rgba(255, 193, 7, 0.2) !important; }
      @keyframes sutian-autoplay-blink { 50% { background-color: transparent; } }
      .userscript-audio-playing { background-color: #FFF352 !important; color: black !important; outline: 2px solid #FFB800 !important; box-shadow: 0 0 10px #FFF352; transition: background-color 0.2s ease-in-out, outline 0.2s ease-in-out; }
      @media (prefers-color-scheme: dark) { .userscript-audio-playing { background-color: #66b3ff !important; outline: 2px solid #87CEFA !important; box-shadow: 0 0 10px #66b3ff; } }
      #sutian-autoplay-host { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.6); z-index: 9998; cursor: pointer; }
      #sutian-autoplay-host iframe { position: fixed; width: 80vw; height: 70vh; top: 50%; left: 50%; transform: translate(-50%, -50%); border: 1px solid #ccc; border-radius: 8px; box-shadow: 0 5px 20px rgba(0, 0, 0, 0.3); background: white; z-index: 9999; cursor: auto; }
      #auto-play-controls-container { position: fixed; top: 10px; left: 10px; z-index: 10001; background: rgba(255, 255, 255, 0.8); padding: 5px 10px; border-radius: 5px; box-shadow: 0 2px 5px rgba(0, 0, 0, 0.2); }
      #auto-play-controls-container button { padding: 6px 12px; border: none; border-radius: 4px; cursor: pointer; font-size: 14px; margin-right: 5px; }
      #auto-play-status { margin-left: 10px; font-size: 14px; vertical-align: middle; }
      .userscript-row-play-button { background: #6c757d; color: white; border: none; border-radius: 50%; width: 22px; height: 22px; margin-right: 6px; cursor: pointer; font-size: 11px; line-height: 22px; padding: 0; }
      #sutian-autoplay-notice { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.4); z-index: 10002; display: flex; align-items: center; justify-content: center; }
      #sutian-autoplay-notice > div { background: white; color: black; padding: 16px 20px; border-radius: 6px; max-width: 60vw; font-size: 15px; }
      #sutian-autoplay-notice button { margin-top: 12px; float: right; }
    `;
    let counter = 0;
    const queue = [];

    function injectStyle(doc) {
      if (!doc || doc.getElementById(STYLE_ID)) return;
      const style = doc.createElement('style');
      style.id = STYLE_ID;
      style.textContent = STYLE;
      (doc.head || doc.documentElement).appendChild(style);
    }

    function hostFrame() {
      const host = document.getElementById(HOST_ID);
      return host ? host.querySelector('iframe') : null;
    }

    function hostDoc() {
      const frame = hostFrame();
      try {
        return frame ? frame.contentDocument : null;
      } catch (e) {
        return null;
      }
    }

    function tag(el, prefix) {
      if (!el.hasAttribute(REF)) {
        counter += 1;
        el.setAttribute(REF, prefix + counter);
      }
      return el.getAttribute(REF);
    }

    function find(ref) {
      const doc = ref.startsWith('h') ? hostDoc() : document;
      return doc ? doc.querySelector('[' + REF + '="' + ref + '"]') : null;
    }

    function trigger(el, sel, prefix) {
      return { element: tag(el, prefix), declared_resource: el.getAttribute(sel.resource_attribute) };
    }

    function scan(sel) {
      const table = document.querySelector(sel.wide_table);
      if (table) {
        const rows = Array.from(table.querySelectorAll(sel.wide_row));
        return {
          shape: 'table',
          candidates: rows.map((row, index) => {
            const link = row.querySelector(sel.entry_link);
            return {
              raw_index: index,
              href: link ? link.getAttribute('href') : null,
              node: tag(row, 'p'),
              trigger: null,
              has_audio: !!link,
            };
          }),
        };
      }
      const items = Array.from(document.querySelectorAll(sel.list_item));
      return {
        shape: items.length ? 'list' : null,
        candidates: items.map((item, index) => {
          const button = item.querySelector(sel.audio_trigger);
          return {
            raw_index: index,
            href: null,
            node: tag(item, 'p'),
            trigger: button ? trigger(button, sel, 'p') : null,
            has_audio: !!button,
          };
        }),
      };
    }

    function containerWithin(link, selector, scope) {
      const found = link.closest(selector);
      if (found && scope.contains(found) && found !== scope) return found;
      return link.parentElement || link;
    }

    function variantLinks(sel, args) {
      const out = [];
      const push = (container, link) =>
        out.push({ container: tag(container, 'p'), href: link.getAttribute('href') });
      if (args.variant === 'wide') {
        const table = document.querySelector(sel.wide_table);
        if (table) {
          table.querySelectorAll(sel.entry_link).forEach((link) => push(link.closest('tr') || link, link));
        }
      } else if (args.variant === 'narrow') {
        document.querySelectorAll(sel.narrow_container).forEach((scope) => {
          scope.querySelectorAll(sel.entry_link).forEach((link) =>
            push(containerWithin(link, sel.narrow_item, scope), link));
        });
      } else {
        document.querySelectorAll(sel.list_item).forEach((item) => {
          const link = item.querySelector(sel.entry_link);
          if (link) push(item, link);
        });
      }
      return out;
    }

    function elementBox(sel, args) {
      const el = find(args.element);
      if (!el || !el.isConnected) return null;
      const rect = el.getBoundingClientRect();
      const fixed = el.ownerDocument.defaultView.getComputedStyle(el).position === 'fixed';
      return { width: rect.width, height: rect.height, has_layout_parent: el.offsetParent !== null || fixed };
    }

    function scrollIntoView(sel, args) {
      const el = find(args.element);
      if (!el) return false;
      el.scrollIntoView({ behavior: 'smooth', block: 'center' });
      return true;
    }

    function setVisual(sel, args) {
      const el = find(args.element);
      if (!el) return false;
      injectStyle(el.ownerDocument);
      Object.values(CLASSES).forEach((name) => el.classList.remove(name));
      if (CLASSES[args.state]) el.classList.add(CLASSES[args.state]);
      return true;
    }

    function activate(sel, args) {
      const el = find(args.element);
      if (!el) return false;
      el.click();
      return true;
    }

    function closeHost() {
      const host = document.getElementById(HOST_ID);
      if (!host) return false;
      host.remove();
      return true;
    }

    function openHost(sel, args) {
      closeHost();
      injectStyle(document);
      return new Promise((resolve) => {
        const host = document.createElement('div');
        host.id = HOST_ID;
        host.addEventListener('click', (event) => {
          if (event.target === host) queue.push({ kind: 'backdrop_clicked' });
        });
        const frame = document.createElement('iframe');
        let settled = false;
        let timer = null;
        const finish = (result) => {
          if (settled) return;
          settled = true;
          if (timer) clearTimeout(timer);
          resolve(result);
        };
        if (args.timeout_ms != null) {
          timer = setTimeout(() => finish({ loaded: false, reason: 'timed out' }), args.timeout_ms);
        }
        frame.addEventListener('load', () => {
          const doc = hostDoc();
          if (!doc || !doc.body) {
            finish({ loaded: false, reason: 'embedded document is not accessible' });
            return;
          }
          injectStyle(doc);
          finish({ loaded: true, reason: null });
        });
        frame.addEventListener('error', () => finish({ loaded: false, reason: 'load error' }));
        frame.src = args.url;
        host.appendChild(frame);
        document.body.appendChild(host);
      });
    }

    function hostUrl() {
      const frame = hostFrame();
      if (!frame) return null;
      try {
        const href = frame.contentWindow.location.href;
        return href && href !== 'about:blank' ? href : frame.src;
      } catch (e) {
        return frame.src;
      }
    }

    function hostTriggers(sel) {
      const doc = hostDoc();
      if (!doc) return [];
      return Array.from(doc.querySelectorAll(sel.audio_trigger)).map((el) => trigger(el, sel, 'h'));
    }

    function nextPageHref(sel) {
      const links = Array.from(document.querySelectorAll(sel.next_page));
      const link = links.find((el) => {
        const href = el.getAttribute('href');
        return href && href !== '#' && !el.closest('.disabled') && !el.hasAttribute('aria-disabled');
      });
      return link ? link.getAttribute('href') : null;
    }

    function replaceUrl(sel, args) {
      history.replaceState(history.state, '', args.url);
      return true;
    }

    function probeDuration(sel, args) {
      return new Promise((resolve) => {
        const audio = new Audio();
        let settled = false;
        const done = (value) => {
          if (settled) return;
          settled = true;
          audio.removeAttribute('src');
          resolve(value);
        };
        audio.preload = 'metadata';
        audio.muted = true;
        audio.addEventListener('loadedmetadata', () =>
          done(Number.isFinite(audio.duration) && audio.duration > 0 ? audio.duration : null));
        audio.addEventListener('error', () => done(null));
        try {
          audio.src = args.url;
        } catch (e) {
          done(null);
        }
      });
    }

    function button(id, label, command) {
      const el = document.createElement('button');
      el.id = id;
      el.type = 'button';
      el.textContent = label;
      el.addEventListener('click', (event) => {
        event.preventDefault();
        queue.push(command);
      });
      return el;
    }

    function rowButton(index) {
      const el = document.createElement('button');
      el.type = 'button';
      el.className = ROW_BUTTON;
      el.dataset.rowIndex = String(index);
      el.title = '從這列開始播放';
      el.textContent = '▶';
      el.addEventListener('click', (event) => {
        event.preventDefault();
        event.stopPropagation();
        queue.push({ kind: 'start_from_row', row: index });
      });
      return el;
    }

    function installControls(sel) {
      injectStyle(document);
      if (!document.getElementById(PANEL_ID)) {
        const panel = document.createElement('div');
        panel.id = PANEL_ID;
        const start = button('auto-play-start-button', '開始播放全部', { kind: 'start' });
        start.style.cssText = 'background-color: #28a745; color: white;';
        const pause = button('auto-play-pause-button', '暫停', { kind: 'toggle_pause' });
        pause.style.cssText = 'background-color: #ffc107; color: black; display: none;';
        const stop = button('auto-play-stop-button', '停止', { kind: 'stop' });
        stop.style.cssText = 'background-color: #dc3545; color: white; display: none;';
        const status = document.createElement('span');
        status.id = 'auto-play-status';
        status.style.display = 'none';
        panel.append(start, pause, stop, status);
        document.body.appendChild(panel);
      }
      const table = document.querySelector(sel.wide_table);
      if (table) {
        table.querySelectorAll(sel.wide_row).forEach((row, index) => {
          if (!row.querySelector(sel.entry_link) || row.querySelector('.' + ROW_BUTTON)) return;
          const cell = row.querySelector(sel.row_number_cell);
          if (cell) cell.insertBefore(rowButton(index), cell.firstChild);
        });
      } else {
        document.querySelectorAll(sel.list_item).forEach((item, index) => {
          if (!item.querySelector(sel.audio_trigger) || item.querySelector('.' + ROW_BUTTON)) return;
          item.insertBefore(rowButton(index), item.firstChild);
        });
      }
      return true;
    }

    function renderControls(sel, args) {
      const start = document.getElementById('auto-play-start-button');
      const pause = document.getElementById('auto-play-pause-button');
      const stop = document.getElementById('auto-play-stop-button');
      const status = document.getElementById('auto-play-status');
      if (!start || !pause || !stop || !status) return false;
      const idle = args.view === 'idle';
      start.style.display = idle ? 'inline-block' : 'none';
      pause.style.display = idle ? 'none' : 'inline-block';
      stop.style.display = idle ? 'none' : 'inline-block';
      pause.textContent = args.view === 'paused' ? '繼續' : '暫停';
      status.textContent = args.status || '';
      status.style.display = args.status ? 'inline-block' : 'none';
      return true;
    }

    function showNotice(sel, args) {
      const existing = document.getElementById(NOTICE_ID);
      if (existing) existing.remove();
      injectStyle(document);
      const shade = document.createElement('div');
      shade.id = NOTICE_ID;
      const box = document.createElement('div');
      const text = document.createElement('p');
      text.textContent = args.message;
      const ok = document.createElement('button');
      ok.type = 'button';
      ok.textContent = 'OK';
      ok.addEventListener('click', () => shade.remove());
      box.append(text, ok);
      shade.appendChild(box);
      document.body.appendChild(shade);
      return true;
    }

    function drainCommands() {
      return queue.splice(0, queue.length);
    }

    return {
      scan, variantLinks, elementBox, scrollIntoView, setVisual, activate,
      openHost, hostUrl, hostTriggers, closeHost, nextPageHref, replaceUrl,
      probeDuration, installControls, renderControls, showNotice, drainCommands,
    };
  })();
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [Op; 17] = [
        Op::Scan,
        Op::VariantLinks,
        Op::ElementBox,
        Op::ScrollIntoView,
        Op::SetVisual,
        Op::Activate,
        Op::OpenHost,
        Op::HostUrl,
        Op::HostTriggers,
        Op::CloseHost,
        Op::NextPageHref,
        Op::ReplaceUrl,
        Op::ProbeDuration,
        Op::InstallControls,
        Op::RenderControls,
        Op::ShowNotice,
        Op::DrainCommands,
    ];

    #[test]
    fn every_op_is_exported_by_the_bundle() {
        let exports = BUNDLE
            .rsplit_once("return {")
            .map(|(_, tail)| tail)
            .unwrap();
        for op in ALL {
            assert!(
                exports.contains(op.method()),
                "{} missing from bundle exports",
                op.method()
            );
            assert!(BUNDLE.contains(&format!("function {}(", op.method())));
        }
    }

    #[test]
    fn call_embeds_json_arguments() {
        let expr = call(
            Op::ShowNotice,
            &json!({"audio_trigger": "button.imtong-liua"}),
            &json!({"message": "He said \"done\""}),
        );
        assert!(expr.starts_with("(() => {"));
        assert!(expr.ends_with("})()"));
        assert!(expr.contains(
            r#"window.__sutianAutoplay.showNotice({"audio_trigger":"button.imtong-liua"}, {"message":"He said \"done\""})"#
        ));
    }

    #[test]
    fn panel_id_matches_bundle() {
        assert!(BUNDLE.contains(&format!("const PANEL_ID = '{}'", PANEL_ID)));
        assert!(BUNDLE.contains(&format!("window.{}", GLOBAL)));
    }
}
