//! Shared runtime behavior block.
//!
//! Game elements and interaction markers produced by the operators are plain
//! `data-evolve-*` attributes. A single script block gives them meaning: a
//! global state container plus delegated event wiring. The controller ensures
//! it once per organism; operators never insert it.

/// Attribute that marks the runtime script.
pub const RUNTIME_MARKER: &str = "data-evolve-runtime";

const RUNTIME_SCRIPT: &str = r#"(function () {
  if (window.__evolveState) return;
  var state = window.__evolveState = { score: 0, collected: 0, player: { x: 0, y: 0 } };
  function render() {
    document.querySelectorAll('[data-evolve-role="score"]').forEach(function (el) {
      el.textContent = String(state.score);
    });
  }
  function act(action, target) {
    if (action === 'score') state.score += 1;
    if (action === 'collect') { state.collected += 1; state.score += 5; target.remove(); }
    if (action === 'toggle') target.classList.toggle('evolve-active');
    if (action === 'highlight') target.classList.add('evolve-highlight');
    if (action === 'move') target.style.transform = 'translate(' + state.player.x + 'px,' + state.player.y + 'px)';
    render();
  }
  function bind(kind, attr) {
    document.addEventListener(kind, function (event) {
      var target = event.target.closest && event.target.closest('[' + attr + ']');
      if (target) act(target.getAttribute(attr), target);
    });
  }
  bind('click', 'data-evolve-on-click');
  bind('mouseover', 'data-evolve-on-hover');
  bind('dragend', 'data-evolve-on-drag');
  bind('keyup', 'data-evolve-on-key');
  document.addEventListener('keydown', function (event) {
    var step = { ArrowLeft: [-8, 0], ArrowRight: [8, 0], ArrowUp: [0, -8], ArrowDown: [0, 8] }[event.key];
    if (!step) return;
    state.player.x += step[0];
    state.player.y += step[1];
    document.querySelectorAll('[data-evolve-role="player"]').forEach(function (el) {
      el.style.transform = 'translate(' + state.player.x + 'px,' + state.player.y + 'px)';
    });
  });
  render();
})();"#;

/// Whether the runtime block is already present.
pub fn has_behavior(markup: &str) -> bool {
    markup.contains(RUNTIME_MARKER)
}

/// Append the runtime block unless it is already present.
pub fn ensure_behavior(markup: &str) -> String {
    if has_behavior(markup) {
        return markup.to_string();
    }
    format!("{markup}<script {RUNTIME_MARKER}=\"1\">{RUNTIME_SCRIPT}</script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Document;

    #[test]
    fn test_ensure_behavior_is_idempotent() {
        let once = ensure_behavior("<div>x</div>");
        let twice = ensure_behavior(&once);
        assert_eq!(once, twice);
        assert_eq!(once.matches(RUNTIME_MARKER).count(), 1);
    }

    #[test]
    fn test_runtime_block_parses_as_script() {
        let markup = ensure_behavior(r#"<div class="container"><p>hi</p></div>"#);
        let doc = Document::parse(&markup).unwrap();
        let script = doc
            .elements()
            .into_iter()
            .find(|&id| doc.has_attr(id, RUNTIME_MARKER))
            .unwrap();
        assert_eq!(doc.tag(script), Some("script"));
        assert!(doc.text_content(script).contains("__evolveState"));
    }
}
