//! Text wrapping and label sizing

/// Wrap width for axis tick labels
pub const TICK_WRAP: usize = 16;

/// Greedy word wrap at `width` characters, returning the lines.
///
/// Whitespace runs collapse to one space. A word longer than `width` is split
/// across lines.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        // Overlong words are chopped to fill the current line first
        while chars.len() > width {
            let room = if current_len == 0 { width } else { width.saturating_sub(current_len + 1) };
            if room == 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            if current_len > 0 {
                current.push(' ');
            }
            current.extend(chars.drain(..room));
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let word_len = chars.len();
        if current_len == 0 {
            current.extend(chars);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.extend(chars);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.extend(chars);
            current_len = word_len;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Wrap to `width` characters and join the lines with newlines
pub fn wrap(text: &str, width: usize) -> String {
    wrap_lines(text, width).join("\n")
}

/// Wrap a tick label at the standard tick width
pub fn wrap_tick(label: &str) -> String {
    wrap(label, TICK_WRAP)
}

/// Pixel box a label has to fit in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub width: f64,
    pub height: f64,
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for TextBox {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 100.0,
            min_size: 8.0,
            max_size: 16.0,
        }
    }
}

/// Result of fitting a label into a [`TextBox`]
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub text: String,
    pub font_size: u32,
    /// Characters per line at the chosen size
    pub line_width: usize,
}

const SIZE_STEP: f64 = 0.1;

fn widest_line(text: &str, font_size: f64) -> f64 {
    text.split('\n')
        .map(|ln| ln.chars().count() as f64 * font_size)
        .fold(0.0, f64::max)
}

fn block_height(text: &str, font_size: f64) -> f64 {
    text.split('\n').count() as f64 * font_size
}

/// Choose a font size that keeps `text` inside `bx`.
///
/// Text that fits at the minimum size grows in steps of 0.1 while it still
/// fits, up to the maximum size. Text that overflows is rewrapped to the line
/// width of the current size and the size steps down, never below the
/// minimum.
pub fn fit_text(text: &str, bx: &TextBox) -> FittedText {
    let line_width = |size: f64| (bx.width / size).floor().max(1.0) as usize;
    // Sizes are min_size + step * SIZE_STEP so repeated steps do not drift
    let size_at = |step: i32| bx.min_size + f64::from(step) * SIZE_STEP;
    let mut step = 0;
    let mut fitted = text.to_string();

    if widest_line(&fitted, size_at(step)) < bx.width {
        loop {
            let next = size_at(step + 1);
            if next > bx.max_size {
                break;
            }
            if widest_line(&fitted, next) >= bx.width || block_height(&fitted, next) > bx.height {
                break;
            }
            step += 1;
        }
    } else {
        while widest_line(&fitted, size_at(step)) > bx.width {
            let joined = fitted.split('\n').collect::<Vec<_>>().join(" ");
            fitted = wrap(&joined, line_width(size_at(step)));
            if size_at(step - 1) < bx.min_size {
                break;
            }
            step -= 1;
        }
    }

    let size = size_at(step).clamp(bx.min_size, bx.max_size);
    FittedText {
        text: fitted,
        font_size: size.floor() as u32,
        line_width: line_width(size),
    }
}
