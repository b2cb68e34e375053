use crate::affine::Matrix;

// Path data in absolute, fully expanded form.
//
// Parsing resolves relative commands, turns H/V into L, turns S/T into C/Q with
// their reflected control points and makes implicit command repeats explicit.
// Arcs stay arcs.

#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    QuadTo(f64, f64, f64, f64),
    ArcTo {
        rx: f64,
        ry: f64,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    },
    Close,
}

/// Rewrites path data under a matrix. Injected into the normalizer so hosts can
/// swap the geometry backend; the built-in one is [`AbsolutePathTransformer`].
pub trait PathTransformer: Send + Sync {
    fn transform(&self, d: &str, matrix: Matrix) -> Result<String, String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AbsolutePathTransformer;

impl PathTransformer for AbsolutePathTransformer {
    fn transform(&self, d: &str, matrix: Matrix) -> Result<String, String> {
        let segs = parse_path_data(d)?;
        Ok(serialize_path(&transform_path_segs(&segs, matrix)))
    }
}

/// Maps every coordinate pair through `ctm`.
///
/// Arc radii are scaled by the lengths of the matrix's column vectors and the
/// x-axis rotation is offset by the matrix's rotation; the sweep flips under a
/// reflection. This is exact for translations, rotations, reflections and
/// uniform scales, and for axis-aligned arcs under axis-aligned non-uniform
/// scale. Rotated arcs under non-uniform scale or skew are approximated: the
/// ellipse axes are not re-derived.
pub fn transform_path_segs(segs: &[PathSeg], ctm: Matrix) -> Vec<PathSeg> {
    if ctm.is_identity() {
        return segs.to_vec();
    }
    let sx = libm::hypot(ctm.a, ctm.b);
    let sy = libm::hypot(ctm.c, ctm.d);
    let angle = libm::atan2(ctm.b, ctm.a).to_degrees();
    let mirrored = ctm.a * ctm.d - ctm.b * ctm.c < 0.0;

    segs.iter()
        .map(|seg| match *seg {
            PathSeg::MoveTo(x, y) => {
                let (x, y) = ctm.apply(x, y);
                PathSeg::MoveTo(x, y)
            }
            PathSeg::LineTo(x, y) => {
                let (x, y) = ctm.apply(x, y);
                PathSeg::LineTo(x, y)
            }
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => {
                let (x1, y1) = ctm.apply(x1, y1);
                let (x2, y2) = ctm.apply(x2, y2);
                let (x, y) = ctm.apply(x, y);
                PathSeg::CurveTo(x1, y1, x2, y2, x, y)
            }
            PathSeg::QuadTo(x1, y1, x, y) => {
                let (x1, y1) = ctm.apply(x1, y1);
                let (x, y) = ctm.apply(x, y);
                PathSeg::QuadTo(x1, y1, x, y)
            }
            PathSeg::ArcTo {
                rx,
                ry,
                rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let (x, y) = ctm.apply(x, y);
                PathSeg::ArcTo {
                    rx: rx * sx,
                    ry: ry * sy,
                    rotation: normalize_degrees(rotation + angle),
                    large_arc,
                    sweep: sweep != mirrored,
                    x,
                    y,
                }
            }
            PathSeg::Close => PathSeg::Close,
        })
        .collect()
}

fn normalize_degrees(deg: f64) -> f64 {
    let r = deg % 360.0;
    if r < 0.0 { r + 360.0 } else { r }
}

/// Writes segments with one explicit command letter per segment.
pub fn serialize_path(segs: &[PathSeg]) -> String {
    let mut out = String::new();
    for seg in segs {
        if !out.is_empty() {
            out.push(' ');
        }
        match *seg {
            PathSeg::MoveTo(x, y) => push_cmd(&mut out, 'M', &[x, y]),
            PathSeg::LineTo(x, y) => push_cmd(&mut out, 'L', &[x, y]),
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => {
                push_cmd(&mut out, 'C', &[x1, y1, x2, y2, x, y])
            }
            PathSeg::QuadTo(x1, y1, x, y) => push_cmd(&mut out, 'Q', &[x1, y1, x, y]),
            PathSeg::ArcTo {
                rx,
                ry,
                rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let large = if large_arc { 1.0 } else { 0.0 };
                let sweep = if sweep { 1.0 } else { 0.0 };
                push_cmd(&mut out, 'A', &[rx, ry, rotation, large, sweep, x, y])
            }
            PathSeg::Close => out.push('Z'),
        }
    }
    out
}

fn push_cmd(out: &mut String, cmd: char, nums: &[f64]) {
    out.push(cmd);
    for n in nums {
        out.push(' ');
        out.push_str(&fmt_num(*n));
    }
}

/// Plain decimal text for a coordinate; never exponent notation, never `-0`.
pub fn fmt_num(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Parses path data into absolute segments. Fails on a missing initial moveto
/// or on any byte that cannot be consumed as part of a command.
pub fn parse_path_data(d: &str) -> Result<Vec<PathSeg>, String> {
    let mut segs = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur_x = 0.0;
    let mut cur_y = 0.0;
    let mut start_x = 0.0;
    let mut start_y = 0.0;
    let mut last_cubic_ctrl2: Option<(f64, f64)> = None;
    let mut last_quad_ctrl: Option<(f64, f64)> = None;

    while let Some((c, explicit)) = p.next_command(&mut cmd) {
        if segs.is_empty() && !matches!(c, 'M' | 'm') {
            return Err(format!("path data must start with a moveto, found '{}'", c));
        }
        let before = p.i;
        match c {
            'M' | 'm' => {
                let rel = c == 'm';
                if let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::MoveTo(x, y));
                    cur_x = x;
                    cur_y = y;
                    start_x = x;
                    start_y = y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;

                    // Implicit subsequent pairs are treated as LineTo.
                    while let Some((x2, y2)) = p.next_pair() {
                        let (x2, y2) = if rel {
                            (cur_x + x2, cur_y + y2)
                        } else {
                            (x2, y2)
                        };
                        segs.push(PathSeg::LineTo(x2, y2));
                        cur_x = x2;
                        cur_y = y2;
                    }
                }
            }
            'L' | 'l' => {
                let rel = c == 'l';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::LineTo(x, y));
                    cur_x = x;
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' | 'h' => {
                let rel = c == 'h';
                while let Some(x) = p.next_number() {
                    let x = if rel { cur_x + x } else { x };
                    segs.push(PathSeg::LineTo(x, cur_y));
                    cur_x = x;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' | 'v' => {
                let rel = c == 'v';
                while let Some(y) = p.next_number() {
                    let y = if rel { cur_y + y } else { y };
                    segs.push(PathSeg::LineTo(cur_x, y));
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' | 'c' => {
                let rel = c == 'c';
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let (x1, y1, x2, y2, x, y) = if rel {
                        (
                            cur_x + x1,
                            cur_y + y1,
                            cur_x + x2,
                            cur_y + y2,
                            cur_x + x,
                            cur_y + y,
                        )
                    } else {
                        (x1, y1, x2, y2, x, y)
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'S' | 's' => {
                let rel = c == 's';
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let (x2, y2, x, y) = if rel {
                        (cur_x + x2, cur_y + y2, cur_x + x, cur_y + y)
                    } else {
                        (x2, y2, x, y)
                    };
                    let (x1, y1) = if let Some((px2, py2)) = last_cubic_ctrl2 {
                        (2.0 * cur_x - px2, 2.0 * cur_y - py2)
                    } else {
                        (cur_x, cur_y)
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'Q' | 'q' => {
                let rel = c == 'q';
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let (x1, y1, x, y) = if rel {
                        (cur_x + x1, cur_y + y1, cur_x + x, cur_y + y)
                    } else {
                        (x1, y1, x, y)
                    };
                    segs.push(PathSeg::QuadTo(x1, y1, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((x1, y1));
                    last_cubic_ctrl2 = None;
                }
            }
            'T' | 't' => {
                let rel = c == 't';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    let (qx, qy) = if let Some((px1, py1)) = last_quad_ctrl {
                        (2.0 * cur_x - px1, 2.0 * cur_y - py1)
                    } else {
                        (cur_x, cur_y)
                    };
                    segs.push(PathSeg::QuadTo(qx, qy, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((qx, qy));
                    last_cubic_ctrl2 = None;
                }
            }
            'A' | 'a' => {
                let rel = c == 'a';
                while let Some((rx, ry, rot, large, sweep, x, y)) = p.next_arc() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::ArcTo {
                        rx: rx.abs(),
                        ry: ry.abs(),
                        rotation: rot,
                        large_arc: large,
                        sweep,
                        x,
                        y,
                    });
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;
                }
            }
            'Z' | 'z' => {
                if explicit {
                    segs.push(PathSeg::Close);
                    cur_x = start_x;
                    cur_y = start_y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;
                }
            }
            _ => {
                return Err(format!("unknown path command '{}' at byte {}", c, before));
            }
        }

        // A repeated command that consumed nothing means the input is stuck on
        // something that is neither a number nor a command letter.
        if !explicit && p.i == before {
            return Err(p.unexpected());
        }
        if explicit && !matches!(c, 'Z' | 'z') && p.i == before {
            return Err(format!("command '{}' is missing its arguments", c));
        }
    }

    Ok(segs)
}

/// Numbers of an SVG number list such as `points`: comma or whitespace
/// separated, or run together where a sign or second dot starts the next one
/// (`10-5`, `.5.5`). Scanning stops at the first byte that is not part of a
/// number.
pub(crate) fn parse_number_list(input: &str) -> Vec<f64> {
    let mut p = PathParser::new(input);
    let mut out = Vec::new();
    while let Some(v) = p.next_number() {
        out.push(v);
    }
    out
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i];
            if b == b' ' || b == b'\n' || b == b'\r' || b == b'\t' || b == b',' {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    fn unexpected(&self) -> String {
        match self.bytes.get(self.i) {
            Some(b) => format!("unexpected character '{}' at byte {}", *b as char, self.i),
            None => "unexpected end of path data".to_string(),
        }
    }

    /// Returns the next command and whether it was written explicitly; numbers
    /// without a letter repeat the previous command.
    fn next_command(&mut self, current: &mut char) -> Option<(char, bool)> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let c = self.bytes[self.i] as char;
        if c.is_ascii_alphabetic() && c != 'e' && c != 'E' {
            *current = c;
            self.i += 1;
            return Some((c, true));
        }
        Some((*current, false))
    }

    fn next_number(&mut self) -> Option<f64> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let start = self.i;
        let mut has = false;

        if matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has = true;
            }
        }
        if has && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            let mark = self.i;
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            let digits_start = self.i;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
            }
            if self.i == digits_start {
                self.i = mark;
            }
        }

        if !has {
            self.i = start;
            return None;
        }

        let s = std::str::from_utf8(&self.bytes[start..self.i]).ok()?;
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.i = start;
                None
            }
        }
    }

    fn next_arc_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        match self.bytes.get(self.i) {
            Some(b'0') => {
                self.i += 1;
                Some(false)
            }
            Some(b'1') => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    fn next_pair(&mut self) -> Option<(f64, f64)> {
        let [x, y] = self.next_numbers::<2>()?;
        Some((x, y))
    }

    /// Reads exactly `N` numbers or rewinds and reads none.
    fn next_numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let start = self.i;
        let mut out = [0.0; N];
        for slot in out.iter_mut() {
            match self.next_number() {
                Some(v) => *slot = v,
                None => {
                    self.i = start;
                    return None;
                }
            }
        }
        Some(out)
    }

    #[allow(clippy::type_complexity)]
    fn next_arc(&mut self) -> Option<(f64, f64, f64, bool, bool, f64, f64)> {
        let start = self.i;
        let parsed = self.read_arc_args();
        if parsed.is_none() {
            self.i = start;
        }
        parsed
    }

    #[allow(clippy::type_complexity)]
    fn read_arc_args(&mut self) -> Option<(f64, f64, f64, bool, bool, f64, f64)> {
        let [rx, ry, rot] = self.next_numbers::<3>()?;
        let large = self.next_arc_flag()?;
        let sweep = self.next_arc_flag()?;
        let (x, y) = self.next_pair()?;
        Some((rx, ry, rot, large, sweep, x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_path() {
        let segs = parse_path_data("M 0 0 L 10 0 L 10 10 Z").unwrap();
        assert_eq!(
            segs,
            vec![
                PathSeg::MoveTo(0.0, 0.0),
                PathSeg::LineTo(10.0, 0.0),
                PathSeg::LineTo(10.0, 10.0),
                PathSeg::Close,
            ]
        );
    }

    #[test]
    fn relative_and_shorthand_commands_expand_to_absolute() {
        let d = "m10 10 h5 v5 l-5 0 z";
        assert_eq!(
            serialize_path(&parse_path_data(d).unwrap()),
            "M 10 10 L 15 10 L 15 15 L 10 15 Z"
        );
    }

    #[test]
    fn implicit_repeats_become_explicit_commands() {
        let d = "M0 0 10 0 10 10 L 0 10 5 5";
        assert_eq!(
            serialize_path(&parse_path_data(d).unwrap()),
            "M 0 0 L 10 0 L 10 10 L 0 10 L 5 5"
        );
    }

    #[test]
    fn smooth_curves_reflect_previous_control_point() {
        let segs = parse_path_data("M0 0 C 0 10 10 10 10 0 S 20 -10 20 0").unwrap();
        assert_eq!(segs[2], PathSeg::CurveTo(10.0, -10.0, 20.0, -10.0, 20.0, 0.0));
        let segs = parse_path_data("M0 0 Q 5 10 10 0 T 20 0").unwrap();
        assert_eq!(segs[2], PathSeg::QuadTo(15.0, -10.0, 20.0, 0.0));
    }

    #[test]
    fn parses_compact_arc_flags_without_separator() {
        let segs = parse_path_data("M10 10 A5 5 0 01 20 20").unwrap();
        assert_eq!(
            segs[1],
            PathSeg::ArcTo {
                rx: 5.0,
                ry: 5.0,
                rotation: 0.0,
                large_arc: false,
                sweep: true,
                x: 20.0,
                y: 20.0,
            }
        );
    }

    #[test]
    fn exponent_numbers_parse() {
        let segs = parse_path_data("M1e1 2E-1L-.5.5").unwrap();
        assert_eq!(segs[0], PathSeg::MoveTo(10.0, 0.2));
        assert_eq!(segs[1], PathSeg::LineTo(-0.5, 0.5));
    }

    #[test]
    fn rejects_garbage_without_looping() {
        assert!(parse_path_data("M 0 0 L 1 1 # 2").is_err());
        assert!(parse_path_data("L 1 1").is_err());
        assert!(parse_path_data("M 0 0 Z 5 5").is_err());
        assert!(parse_path_data("M 0 0 L").is_err());
    }

    #[test]
    fn empty_path_parses_to_nothing() {
        assert!(parse_path_data("").unwrap().is_empty());
        assert!(parse_path_data("  ").unwrap().is_empty());
    }

    #[test]
    fn transformer_maps_every_coordinate() {
        let t = AbsolutePathTransformer;
        let out = t
            .transform("M 1 1 l 1 0", Matrix::translate(5.0, 0.0).mul(Matrix::scale(2.0, 2.0)))
            .unwrap();
        assert_eq!(out, "M 7 2 L 9 2");
    }

    #[test]
    fn arcs_scale_radii_under_uniform_scale() {
        let segs = parse_path_data("M 0 0 A 5 5 0 1 0 10 0").unwrap();
        let out = transform_path_segs(&segs, Matrix::scale(2.0, 2.0));
        assert_eq!(serialize_path(&out), "M 0 0 A 10 10 0 1 0 20 0");
    }

    #[test]
    fn arcs_flip_sweep_under_reflection() {
        let segs = parse_path_data("M 0 0 A 5 5 0 0 1 10 0").unwrap();
        let out = transform_path_segs(&segs, Matrix::scale(1.0, -1.0));
        match out[1] {
            PathSeg::ArcTo { sweep, y, .. } => {
                assert!(!sweep);
                assert_eq!(y, 0.0);
            }
            ref other => panic!("expected arc, got {:?}", other),
        }
    }

    // Rotated arcs under a non-uniform scale keep their parameters approximately:
    // only the per-axis lengths and the x-axis angle are carried over.
    #[test]
    fn rotated_arc_under_non_uniform_scale_is_approximate() {
        let segs = parse_path_data("M 0 0 A 10 5 45 0 1 10 10").unwrap();
        let out = transform_path_segs(&segs, Matrix::scale(2.0, 1.0));
        match out[1] {
            PathSeg::ArcTo {
                rx, ry, rotation, ..
            } => {
                assert_eq!((rx, ry, rotation), (20.0, 5.0, 45.0));
            }
            ref other => panic!("expected arc, got {:?}", other),
        }
    }

    #[test]
    fn number_lists_split_on_signs_and_dots() {
        assert_eq!(parse_number_list("0,0 10-5"), vec![0.0, 0.0, 10.0, -5.0]);
        assert_eq!(parse_number_list(" .5.5,1e2-3E-1 "), vec![0.5, 0.5, 100.0, -0.3]);
        assert_eq!(parse_number_list("1 2 x 3"), vec![1.0, 2.0]);
        assert!(parse_number_list("").is_empty());
        assert!(parse_number_list("中 1").is_empty());
    }
}
