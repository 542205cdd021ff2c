//! Property tests over the quaternion algebra used at every stroke end.

use gk_core::{Quaternion, Vec3};
use proptest::prelude::*;

fn arb_quaternion() -> impl Strategy<Value = Quaternion> {
    (
        -1.0..1.0f64,
        -1.0..1.0f64,
        -1.0..1.0f64,
        -1.0..1.0f64,
    )
        .prop_filter("needs nonzero magnitude", |(w, x, y, z)| {
            w * w + x * x + y * y + z * z > 1e-3
        })
        .prop_map(|(w, x, y, z)| Quaternion::new(w, x, y, z))
}

proptest! {
    #[test]
    fn normalize_is_idempotent(q in arb_quaternion()) {
        let once = q.normalize();
        let twice = once.normalize();
        prop_assert!((once.dot(twice) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn product_stays_unit(a in arb_quaternion(), b in arb_quaternion()) {
        let p = a * b;
        let norm = p.dot(p).sqrt();
        prop_assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn conjugate_inverts(q in arb_quaternion()) {
        let id = q * q.conjugate();
        prop_assert!(id.angular_distance(Quaternion::identity()) < 1e-9);
    }

    #[test]
    fn axes_roundtrip(q in arb_quaternion()) {
        let [d0, d1, d2] = q.to_axes();
        let back = Quaternion::from_axes(d0, d1, d2).unwrap();
        prop_assert!(q.angular_distance(back) < 1e-8);
    }

    #[test]
    fn rotation_preserves_length(q in arb_quaternion(), x in -10.0..10.0f64, y in -10.0..10.0f64, z in -10.0..10.0f64) {
        let v = Vec3::new(x, y, z);
        let rotated = q.rotate(v);
        prop_assert!((rotated.length() - v.length()).abs() < 1e-9);
    }
}
