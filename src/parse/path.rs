//! Compact path mini-language (SVG path data subset) to [`BezPath`].
//!
//! Supported commands: `M L H V C S Q T A Z`, absolute (upper case) and relative (lower case),
//! with implicit command repetition. Unknown commands are logged and skipped together with their
//! arguments; a command with missing arguments ends parsing at that point.

use kurbo::{Affine, BezPath, Point, Shape, SvgArc, Vec2};

const ARC_TOLERANCE: f64 = 0.1;

/// Parse `d` and scale the result uniformly by `scale`.
pub fn parse_path(d: &str, scale: f64) -> BezPath {
    let mut path = PathBuilder::default().run(d);
    if scale != 1.0 {
        path.apply_affine(Affine::scale(scale));
    }
    path
}

/// Size of the path's bounding box measured from the origin, used as an element's natural size.
pub fn natural_size(path: &BezPath) -> Option<(f64, f64)> {
    if path.elements().is_empty() {
        return None;
    }
    let bb = path.bounding_box();
    Some((bb.x1.max(0.0), bb.y1.max(0.0)))
}

#[derive(Default)]
struct PathBuilder {
    path: BezPath,
    current: Point,
    start: Point,
    // Second control point of the previous C/S (or the Q/T control), for reflection.
    last_cubic_ctrl: Option<Point>,
    last_quad_ctrl: Option<Point>,
}

impl PathBuilder {
    fn run(mut self, d: &str) -> BezPath {
        let mut lexer = Lexer::new(d);
        let mut cmd: Option<char> = None;

        loop {
            match lexer.peek() {
                Token::End => break,
                Token::Command(c) => {
                    lexer.bump();
                    if matches!(c, 'Z' | 'z') {
                        self.close();
                        cmd = None;
                        continue;
                    }
                    if !is_known(c) {
                        tracing::warn!(command = %c, "unknown path command; skipping");
                        lexer.skip_numbers();
                        cmd = None;
                        continue;
                    }
                    cmd = Some(c);
                }
                Token::Number => {
                    if cmd.is_none() {
                        tracing::debug!("stray value in path data; skipping it");
                        if lexer.number().is_none() {
                            lexer.bump();
                        }
                        continue;
                    }
                }
            }

            let Some(c) = cmd else { continue };
            if !self.segment(c, &mut lexer) {
                tracing::debug!(command = %c, "path command is missing arguments");
                break;
            }
            // A moveto followed by bare coordinates continues as lineto.
            cmd = match c {
                'M' => Some('L'),
                'm' => Some('l'),
                other => Some(other),
            };
        }
        self.path
    }

    fn segment(&mut self, c: char, lx: &mut Lexer<'_>) -> bool {
        let rel = c.is_ascii_lowercase();
        let base = if rel { self.current.to_vec2() } else { Vec2::ZERO };
        let pt = |lx: &mut Lexer<'_>| -> Option<Point> {
            let x = lx.number()?;
            let y = lx.number()?;
            Some(Point::new(x, y) + base)
        };

        match c.to_ascii_uppercase() {
            'M' => {
                let Some(p) = pt(lx) else { return false };
                self.path.move_to(p);
                self.current = p;
                self.start = p;
                self.reset_ctrl();
            }
            'L' => {
                let Some(p) = pt(lx) else { return false };
                self.line_to(p);
            }
            'H' => {
                let Some(x) = lx.number() else { return false };
                let x = if rel { self.current.x + x } else { x };
                self.line_to(Point::new(x, self.current.y));
            }
            'V' => {
                let Some(y) = lx.number() else { return false };
                let y = if rel { self.current.y + y } else { y };
                self.line_to(Point::new(self.current.x, y));
            }
            'C' => {
                let (Some(c1), Some(c2), Some(p)) = (pt(lx), pt(lx), pt(lx)) else {
                    return false;
                };
                self.curve_to(c1, c2, p);
            }
            'S' => {
                let (Some(c2), Some(p)) = (pt(lx), pt(lx)) else {
                    return false;
                };
                let c1 = reflect(self.last_cubic_ctrl, self.current);
                self.curve_to(c1, c2, p);
            }
            'Q' => {
                let (Some(c1), Some(p)) = (pt(lx), pt(lx)) else {
                    return false;
                };
                self.quad_to(c1, p);
            }
            'T' => {
                let Some(p) = pt(lx) else { return false };
                let c1 = reflect(self.last_quad_ctrl, self.current);
                self.quad_to(c1, p);
            }
            'A' => {
                let (Some(rx), Some(ry), Some(rot), Some(large), Some(sweep)) = (
                    lx.number(),
                    lx.number(),
                    lx.number(),
                    lx.number(),
                    lx.number(),
                ) else {
                    return false;
                };
                let Some(p) = pt(lx) else { return false };
                self.arc_to(rx, ry, rot, large != 0.0, sweep != 0.0, p);
            }
            _ => return false,
        }
        true
    }

    fn ensure_started(&mut self) {
        if self.path.elements().is_empty() {
            self.path.move_to(self.current);
            self.start = self.current;
        }
    }

    fn line_to(&mut self, p: Point) {
        self.ensure_started();
        self.path.line_to(p);
        self.current = p;
        self.reset_ctrl();
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.ensure_started();
        self.path.curve_to(c1, c2, p);
        self.current = p;
        self.last_cubic_ctrl = Some(c2);
        self.last_quad_ctrl = None;
    }

    fn quad_to(&mut self, c1: Point, p: Point) {
        self.ensure_started();
        self.path.quad_to(c1, p);
        self.current = p;
        self.last_quad_ctrl = Some(c1);
        self.last_cubic_ctrl = None;
    }

    fn arc_to(&mut self, rx: f64, ry: f64, rot_deg: f64, large: bool, sweep: bool, p: Point) {
        self.ensure_started();
        let svg = SvgArc {
            from: self.current,
            to: p,
            radii: Vec2::new(rx.abs(), ry.abs()),
            x_rotation: rot_deg.to_radians(),
            large_arc: large,
            sweep,
        };
        match kurbo::Arc::from_svg_arc(&svg) {
            Some(arc) => {
                let path = &mut self.path;
                arc.to_cubic_beziers(ARC_TOLERANCE, |c1, c2, end| path.curve_to(c1, c2, end));
            }
            // Degenerate radii collapse to a straight line.
            None => self.path.line_to(p),
        }
        self.current = p;
        self.reset_ctrl();
    }

    fn close(&mut self) {
        if !self.path.elements().is_empty() {
            self.path.close_path();
        }
        self.current = self.start;
        self.reset_ctrl();
    }

    fn reset_ctrl(&mut self) {
        self.last_cubic_ctrl = None;
        self.last_quad_ctrl = None;
    }
}

fn reflect(ctrl: Option<Point>, around: Point) -> Point {
    match ctrl {
        Some(c) => around + (around - c),
        None => around,
    }
}

fn is_known(c: char) -> bool {
    matches!(
        c.to_ascii_uppercase(),
        'M' | 'L' | 'H' | 'V' | 'C' | 'S' | 'Q' | 'T' | 'A' | 'Z'
    )
}

enum Token {
    Command(char),
    Number,
    End,
}

struct Lexer<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(d: &'a str) -> Self {
        Self {
            s: d.as_bytes(),
            pos: 0,
        }
    }

    fn skip_separators(&mut self) {
        while self
            .s
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b',')
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Token {
        self.skip_separators();
        match self.s.get(self.pos) {
            None => Token::End,
            Some(b) if b.is_ascii_alphabetic() && *b != b'e' && *b != b'E' => {
                Token::Command(char::from(*b))
            }
            Some(_) => Token::Number,
        }
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_numbers(&mut self) {
        while matches!(self.peek(), Token::Number) {
            if self.number().is_none() {
                // Not a number and not a command letter: drop the byte.
                self.bump();
            }
        }
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;
        let s = self.s;
        let mut i = self.pos;
        if i < s.len() && (s[i] == b'+' || s[i] == b'-') {
            i += 1;
        }
        let mut seen_digit = false;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
            seen_digit = true;
        }
        if i < s.len() && s[i] == b'.' {
            i += 1;
            while i < s.len() && s[i].is_ascii_digit() {
                i += 1;
                seen_digit = true;
            }
        }
        if !seen_digit {
            return None;
        }
        if i < s.len() && (s[i] == b'e' || s[i] == b'E') {
            let mut j = i + 1;
            if j < s.len() && (s[j] == b'+' || s[j] == b'-') {
                j += 1;
            }
            if j < s.len() && s[j].is_ascii_digit() {
                while j < s.len() && s[j].is_ascii_digit() {
                    j += 1;
                }
                i = j;
            }
        }
        let text = std::str::from_utf8(&s[start..i]).ok()?;
        let v = text.parse::<f64>().ok()?;
        self.pos = i;
        Some(v)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/parse/path.rs"]
mod tests;
