// 2D affine matrices in SVG coefficient order.
//
// A matrix [a b c d e f] maps (x, y) to (a*x + c*y + e, b*x + d*y + f).
// Composition is not commutative: `parent.mul(child)` applies `child` first,
// which is how nested `transform` attributes and multi-function transform lists
// combine.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Rotation by `deg` degrees about the origin.
    pub fn rotate(deg: f64) -> Self {
        let rad = deg.to_radians();
        let s = libm::sin(rad);
        let c = libm::cos(rad);
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Rotation about the pivot (cx, cy): translate(cx,cy) * rotate * translate(-cx,-cy).
    pub fn rotate_about(deg: f64, cx: f64, cy: f64) -> Self {
        Matrix::translate(cx, cy)
            .mul(Matrix::rotate(deg))
            .mul(Matrix::translate(-cx, -cy))
    }

    pub fn skew_x(deg: f64) -> Self {
        Self {
            c: libm::tan(deg.to_radians()),
            ..Self::IDENTITY
        }
    }

    pub fn skew_y(deg: f64) -> Self {
        Self {
            b: libm::tan(deg.to_radians()),
            ..Self::IDENTITY
        }
    }

    pub fn mul(self, other: Self) -> Self {
        // [self] * [other]
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Applies only the linear part; used for relative vectors.
    pub fn apply_vector(self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y, self.b * x + self.d * y)
    }

    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// `M_total = parent ∘ child`; the child transform is applied to points first.
pub fn compose(parent: Matrix, child: Matrix) -> Matrix {
    parent.mul(child)
}

/// Parses an SVG `transform` attribute. Functions compose left to right in the
/// order written. Unknown names, unparseable arguments and wrong argument counts
/// contribute identity for that term; this never fails.
pub fn parse_transform(input: &str) -> Matrix {
    let mut out = Matrix::identity();
    let mut s = input.trim_start_matches(|c: char| c.is_whitespace() || c == ',');

    while !s.is_empty() {
        let Some(open) = s.find('(') else { break };
        let name = s[..open].trim();
        let Some(close) = s[open + 1..].find(')') else {
            break;
        };
        let args_str = &s[open + 1..open + 1 + close];
        let m = parse_number_list(args_str)
            .map(|args| transform_term(name, &args))
            .unwrap_or_default();

        out = out.mul(m);
        s = s[open + 1 + close + 1..]
            .trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    out
}

fn transform_term(name: &str, args: &[f64]) -> Matrix {
    match (name, args) {
        ("matrix", [a, b, c, d, e, f]) => Matrix::new(*a, *b, *c, *d, *e, *f),
        ("translate", [tx]) => Matrix::translate(*tx, 0.0),
        ("translate", [tx, ty]) => Matrix::translate(*tx, *ty),
        ("scale", [s]) => Matrix::scale(*s, *s),
        ("scale", [sx, sy]) => Matrix::scale(*sx, *sy),
        ("rotate", [deg]) => Matrix::rotate(*deg),
        ("rotate", [deg, cx, cy]) => Matrix::rotate_about(*deg, *cx, *cy),
        ("skewX", [deg]) => Matrix::skew_x(*deg),
        ("skewY", [deg]) => Matrix::skew_y(*deg),
        _ => Matrix::identity(),
    }
}

fn parse_number_list(input: &str) -> Option<Vec<f64>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn approx_pt(p: (f64, f64), x: f64, y: f64) -> bool {
        approx(p.0, x) && approx(p.1, y)
    }

    fn approx_m(m: Matrix, n: Matrix) -> bool {
        m.to_array()
            .iter()
            .zip(n.to_array().iter())
            .all(|(a, b)| approx(*a, *b))
    }

    #[test]
    fn translate_then_scale_applies_in_document_order() {
        let m = parse_transform("translate(5,0) scale(2)");
        assert!(approx_pt(m.apply(1.0, 1.0), 7.0, 2.0));
    }

    #[test]
    fn composition_is_associative() {
        let a = parse_transform("rotate(30)");
        let b = parse_transform("skewX(10) translate(3 4)");
        let c = parse_transform("matrix(1 2 3 4 5 6)");
        assert!(approx_m(a.mul(b).mul(c), a.mul(b.mul(c))));
    }

    #[test]
    fn composition_is_not_commutative() {
        let t = Matrix::translate(5.0, 0.0);
        let s = Matrix::scale(2.0, 2.0);
        assert!(!approx_m(compose(t, s), compose(s, t)));
        assert!(approx_pt(compose(s, t).apply(1.0, 1.0), 12.0, 2.0));
    }

    #[test]
    fn primitives_match_hand_computed_values() {
        assert!(approx_pt(parse_transform("matrix(1,2,3,4,5,6)").apply(1.0, 1.0), 9.0, 12.0));
        assert!(approx_pt(parse_transform("translate(3)").apply(1.0, 1.0), 4.0, 1.0));
        assert!(approx_pt(parse_transform("scale(2,3)").apply(1.0, 1.0), 2.0, 3.0));
        assert!(approx_pt(parse_transform("scale(4)").apply(1.0, 1.0), 4.0, 4.0));
        assert!(approx_pt(parse_transform("rotate(90)").apply(1.0, 0.0), 0.0, 1.0));
        assert!(approx_pt(parse_transform("skewX(45)").apply(0.0, 1.0), 1.0, 1.0));
        assert!(approx_pt(parse_transform("skewY(45)").apply(1.0, 0.0), 1.0, 1.0));
    }

    #[test]
    fn pivoted_rotate_keeps_pivot_fixed() {
        let m = parse_transform("rotate(90, 10, 10)");
        assert!(approx_pt(m.apply(10.0, 10.0), 10.0, 10.0));
        assert!(approx_pt(m.apply(20.0, 10.0), 10.0, 20.0));
    }

    #[test]
    fn malformed_terms_fall_back_to_identity() {
        assert!(parse_transform("bogus(1,2)").is_identity());
        assert!(parse_transform("matrix(1,2,3)").is_identity());
        assert!(parse_transform("rotate(10, 5)").is_identity());
        assert!(parse_transform("translate(a,b)").is_identity());
        assert!(parse_transform("").is_identity());
        // A bad term does not poison its neighbours.
        let m = parse_transform("translate(2,0) bogus(9) scale(3)");
        assert!(approx_pt(m.apply(1.0, 1.0), 5.0, 3.0));
    }

    #[test]
    fn comma_separated_function_lists_parse() {
        let m = parse_transform("translate(1, 2), scale(2)");
        assert!(approx_pt(m.apply(1.0, 1.0), 3.0, 4.0));
    }
}
