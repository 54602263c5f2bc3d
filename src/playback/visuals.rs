//! In-page cursor and highlight effects.
//!
//! Every function here only builds JavaScript/CSS text; the executor decides
//! when to evaluate it and treats failures as cosmetic.

use crate::playback::driver::BoundingBox;

const CURSOR_SIZE: u32 = 24;
const CURSOR_Z_INDEX: u32 = 999_999;

/// Control points of the cursor's ease curve.
const EASE_P1: f64 = 0.42;
const EASE_P2: f64 = 0.58;

// Arrow glyph, already percent-encoded for a data URL.
const CURSOR_DATA_URL: &str = "data:image/svg+xml,%3Csvg%20xmlns%3D'http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg'%20width%3D'24'%20height%3D'24'%20viewBox%3D'0%200%2024%2024'%3E%3Cpath%20d%3D'M4%201L4%2019L8.5%2014.5L12.5%2022L15%2021L11%2013L17%2013Z'%20fill%3D'white'%20stroke%3D'black'%20stroke-width%3D'1.2'%20stroke-linejoin%3D'round'%2F%3E%3C%2Fsvg%3E";

/// Cubic-bezier ease used for cursor travel, `t` in `[0, 1]`.
pub fn ease(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let mt = 1.0 - t;
    3.0 * mt * mt * t * EASE_P1 + 3.0 * mt * t * t * EASE_P2 + t * t * t
}

pub fn cursor_css() -> String {
    format!(
        r#"#dm-cursor {{
  position: fixed;
  width: {size}px;
  height: {size}px;
  pointer-events: none;
  z-index: {z};
  transform: translate(-4px, -2px);
  background-image: url("{url}");
  background-size: contain;
  background-repeat: no-repeat;
  filter: drop-shadow(1px 2px 2px rgba(0, 0, 0, 0.35));
  transition: transform 0.15s ease;
}}
#dm-focus-ring {{
  position: fixed;
  left: 0;
  top: 0;
  pointer-events: none;
  z-index: {z_focus};
  opacity: 0;
  border-radius: 12px;
  border: 2px solid rgba(50, 220, 255, 0.95);
  box-shadow: 0 0 0 6px rgba(50, 220, 255, 0.18), 0 12px 28px rgba(0, 0, 0, 0.25);
  transition: opacity 0.12s ease, transform 0.12s ease;
}}
#dm-spotlight {{
  position: fixed;
  left: 0;
  top: 0;
  pointer-events: none;
  z-index: {z_spot};
  opacity: 0;
  border-radius: 16px;
  background: rgba(255, 255, 255, 0.04);
  box-shadow: 0 0 0 9999px rgba(2, 6, 23, 0.22);
  transition: opacity 0.14s ease, transform 0.14s ease;
}}
.dm-ripple {{
  position: fixed;
  width: 16px;
  height: 16px;
  pointer-events: none;
  z-index: {z_ripple};
  border-radius: 999px;
  border: 2px solid rgba(255, 255, 255, 0.85);
  box-shadow: 0 0 0 4px rgba(50, 220, 255, 0.25);
  transform: translate(-50%, -50%) scale(0.2);
  animation: dm-ripple 420ms ease-out forwards;
}}
@keyframes dm-ripple {{
  0% {{ transform: translate(-50%, -50%) scale(0.2); opacity: 0.95; }}
  100% {{ transform: translate(-50%, -50%) scale(2.2); opacity: 0; }}
}}"#,
        size = CURSOR_SIZE,
        z = CURSOR_Z_INDEX,
        z_focus = CURSOR_Z_INDEX - 1,
        z_ripple = CURSOR_Z_INDEX - 2,
        z_spot = CURSOR_Z_INDEX - 3,
        url = CURSOR_DATA_URL,
    )
}

/// Creates the cursor element if the page does not have one yet.
pub const ENSURE_CURSOR_JS: &str = r#"
(() => {
  if (!document.getElementById('dm-cursor')) {
    const cursor = document.createElement('div');
    cursor.id = 'dm-cursor';
    cursor.style.left = '0px';
    cursor.style.top = '0px';
    document.body.appendChild(cursor);
  }
  return true;
})()
"#;

pub fn move_cursor_script(from: (f64, f64), to: (f64, f64), duration_ms: u64) -> String {
    format!(
        r#"
(() => {{
  let cursor = document.getElementById('dm-cursor');
  if (!cursor) {{
    cursor = document.createElement('div');
    cursor.id = 'dm-cursor';
    document.body.appendChild(cursor);
  }}
  const startX = {fx}, startY = {fy}, endX = {tx}, endY = {ty};
  const duration = {duration_ms};
  const start = performance.now();
  const ease = (t) => {{
    const mt = 1 - t;
    return 3 * mt * mt * t * {p1} + 3 * mt * t * t * {p2} + t * t * t;
  }};
  const step = (now) => {{
    const progress = Math.min((now - start) / duration, 1);
    const e = ease(progress);
    cursor.style.left = (startX + (endX - startX) * e) + 'px';
    cursor.style.top = (startY + (endY - startY) * e) + 'px';
    if (progress < 1) requestAnimationFrame(step);
  }};
  cursor.style.left = startX + 'px';
  cursor.style.top = startY + 'px';
  requestAnimationFrame(step);
  return true;
}})()
"#,
        fx = from.0,
        fy = from.1,
        tx = to.0,
        ty = to.1,
        p1 = EASE_P1,
        p2 = EASE_P2,
    )
}

pub const CLICK_PULSE_JS: &str = r#"
(() => {
  const cursor = document.getElementById('dm-cursor');
  if (!cursor) return false;
  cursor.style.transform = 'translate(-4px, -2px) scale(0.7)';
  setTimeout(() => { cursor.style.transform = 'translate(-4px, -2px) scale(1)'; }, 150);
  return true;
})()
"#;

/// Positions a named overlay element around `b` with `pad` px of slack and
/// fades it out after `hold_ms`.
fn highlight_script(id: &str, b: &BoundingBox, pad: f64, hold_ms: u64) -> String {
    let x = (b.x - pad).max(0.0);
    let y = (b.y - pad).max(0.0);
    let w = (b.width + pad * 2.0).max(8.0);
    let h = (b.height + pad * 2.0).max(8.0);
    format!(
        r#"
(() => {{
  let el = document.getElementById('{id}');
  if (!el) {{
    el = document.createElement('div');
    el.id = '{id}';
    document.body.appendChild(el);
  }}
  el.style.width = '{w}px';
  el.style.height = '{h}px';
  el.style.transform = 'translate({x}px, {y}px)';
  el.style.opacity = '1';
  setTimeout(() => {{ el.style.opacity = '0'; }}, {hold_ms});
  return true;
}})()
"#
    )
}

pub fn spotlight_script(b: &BoundingBox) -> String {
    highlight_script("dm-spotlight", b, 16.0, 650)
}

pub fn focus_script(b: &BoundingBox) -> String {
    highlight_script("dm-focus-ring", b, 10.0, 420)
}

pub fn ripple_script(b: &BoundingBox) -> String {
    let (x, y) = b.center();
    format!(
        r#"
(() => {{
  const el = document.createElement('div');
  el.className = 'dm-ripple';
  el.style.left = '{x}px';
  el.style.top = '{y}px';
  document.body.appendChild(el);
  setTimeout(() => el.remove(), 800);
  return true;
}})()
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_hits_endpoints_and_is_monotonic() {
        assert_eq!(ease(0.0), 0.0);
        assert!((ease(1.0) - 1.0).abs() < 1e-9);
        let samples: Vec<f64> = (0..=10).map(|i| ease(i as f64 / 10.0)).collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn highlight_is_padded_and_clamped() {
        let b = BoundingBox {
            x: 4.0,
            y: 100.0,
            width: 2.0,
            height: 20.0,
        };
        let js = focus_script(&b);
        assert!(js.contains("translate(0px, 90px)"));
        assert!(js.contains("width = '22px'"));
    }

    #[test]
    fn cursor_css_layers_overlays_below_cursor() {
        let css = cursor_css();
        assert!(css.contains("z-index: 999999;"));
        assert!(css.contains("z-index: 999996;"));
        assert!(css.contains("@keyframes dm-ripple"));
    }
}
