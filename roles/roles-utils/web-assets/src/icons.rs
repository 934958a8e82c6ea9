use std::sync::OnceLock;

pub const PICKAXE_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#00ff00"><path stroke-linecap="round" stroke-linejoin="round" d="M12.265 3.703c-2.536-.225-4.88.459-6.423 1.79-.19.164-.02.443.226.385 1.717-.41 3.67-.494 5.704-.197l.493-1.978zM15.168 6.527c1.935.693 3.62 1.685 4.944 2.853.189.166.472 0 .38-.235-.736-1.899-2.486-3.603-4.83-4.595l-.494 1.977zM12.481 5.936l1.94.484-1.209 4.851-1.94-.484zM10.787 10.667l2.91.726L11.4 20.61l-2.911-.726z"/><path stroke-linecap="round" stroke-linejoin="round" d="M12.358 3.329l3.396.847-.665 2.668-3.396-.847z"/></svg>"##;
/// Served at /favicon.ico.
pub const PICKAXE_FAVICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#00ff00"><circle cx="12" cy="12" r="11" fill="#1a1a1a"/><path stroke-linecap="round" stroke-linejoin="round" d="M12.265 3.703c-2.536-.225-4.88.459-6.423 1.79-.19.164-.02.443.226.385 1.717-.41 3.67-.494 5.704-.197l.493-1.978zM15.168 6.527c1.935.693 3.62 1.685 4.944 2.853.189.166.472 0 .38-.235-.736-1.899-2.486-3.603-4.83-4.595l-.494 1.977zM12.481 5.936l1.94.484-1.209 4.851-1.94-.484zM10.787 10.667l2.91.726L11.4 20.61l-2.911-.726z"/><path stroke-linecap="round" stroke-linejoin="round" d="M12.358 3.329l3.396.847-.665 2.668-3.396-.847z"/></svg>"##;
pub const CLOCK_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#00ff00"><circle cx="12" cy="12" r="8.5"></circle><path stroke-linecap="round" stroke-linejoin="round" d="M12 7v5l2.8 2.8"></path></svg>"##;
pub const THERMOMETER_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#00ff00"><path stroke-linecap="round" stroke-linejoin="round" d="M10 13.5V5a2 2 0 014 0v8.5a4 4 0 11-4 0z"></path><path stroke-linecap="round" d="M12 10v6"></path></svg>"##;
pub const PULSE_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#00ff00"><path stroke-linecap="round" stroke-linejoin="round" d="M3.5 12h4l2-5 4 10 2-5h5"></path></svg>"##;

fn encode_for_data_uri(svg: &str) -> String {
    svg.replace('#', "%23")
        .replace('<', "%3C")
        .replace('>', "%3E")
        .replace('"', "%22")
        .replace(' ', "%20")
}

pub fn svg_data_uri(svg: &str) -> String {
    format!("data:image/svg+xml;charset=utf8,{}", encode_for_data_uri(svg))
}

/// `::before` rule that draws `svg` in the element's text color.
fn icon_rule(class: &str, svg: &str) -> String {
    format!(
        r#"
        .{class}::before {{
            content: '';
            display: inline-block;
            width: 1.2em;
            height: 1.2em;
            vertical-align: middle;
            margin-right: 0.3em;
            background-color: currentColor;
            mask: url('{uri}') center / contain no-repeat;
            -webkit-mask: url('{uri}') center / contain no-repeat;
        }}
        "#,
        class = class,
        uri = svg_data_uri(svg)
    )
}

static ICON_CSS: OnceLock<String> = OnceLock::new();

/// Stylesheet for every icon class the dashboard uses:
/// `pickaxe-icon`, `clock-icon`, `temp-icon` and `pulse-icon`.
pub fn icon_css() -> &'static str {
    ICON_CSS
        .get_or_init(|| {
            let mut css = String::new();
            for (class, svg) in [
                ("pickaxe-icon", PICKAXE_ICON_INLINE_SVG),
                ("clock-icon", CLOCK_ICON_INLINE_SVG),
                ("temp-icon", THERMOMETER_ICON_INLINE_SVG),
                ("pulse-icon", PULSE_ICON_INLINE_SVG),
            ] {
                css.push_str(&icon_rule(class, svg));
            }
            css.push_str(
                r#"
        h1:hover .pickaxe-icon::before {
            filter: drop-shadow(0 0 10px #00ff00);
        }
        "#,
            );
            css
        })
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_has_no_raw_markup() {
        let uri = svg_data_uri(CLOCK_ICON_INLINE_SVG);
        assert!(uri.starts_with("data:image/svg+xml;charset=utf8,%3Csvg"));
        assert!(!uri.contains('<'));
        assert!(!uri.contains('#'));
        assert!(!uri.contains(' '));
    }

    #[test]
    fn test_icon_css_covers_dashboard_classes() {
        let css = icon_css();
        for class in ["pickaxe-icon", "clock-icon", "temp-icon", "pulse-icon"] {
            assert!(css.contains(&format!(".{}::before", class)), "{}", class);
        }
    }
}
