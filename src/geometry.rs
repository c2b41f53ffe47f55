//! Vector algebra and periodic boundary helpers.
//!
//! Boxes are triclinic, in the GROMACS convention: the first box vector lies along x, the second
//! lies in the xy-plane, and the third is arbitrary. In matrix form that makes the box lower
//! triangular, with the box vectors as the columns of a [`BoxVec`].
use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;

use crate::BoxVec;

/// Returns the minimum image of the displacement `a`.
///
/// Whole box vectors are removed from `a` until it points into the central image, starting with
/// the third box vector (the only one with a z component) and ending with the first.
pub fn pbc(mut a: Vec3, boxvec: &BoxVec) -> Vec3 {
    let [bx, by, bz] = [boxvec.x_axis, boxvec.y_axis, boxvec.z_axis];

    let shift = (a.z / bz.z).round_ties_even();
    if shift != 0.0 {
        a -= bz * shift;
    }
    let shift = (a.y / by.y).round_ties_even();
    if shift != 0.0 {
        a -= by * shift;
    }
    let shift = (a.x / bx.x).round_ties_even();
    if shift != 0.0 {
        a -= bx * shift;
    }

    a
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    a.cross(b)
}

pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a.dot(b)
}

pub fn magnitude(a: Vec3) -> f32 {
    dot(a, a).sqrt()
}

/// Distance between `a` and `b`, taking the periodic boundaries into account.
pub fn distance(a: Vec3, b: Vec3, boxvec: &BoxVec) -> f32 {
    distance2(a, b, boxvec).sqrt()
}

/// Squared distance between `a` and `b`, taking the periodic boundaries into account.
pub fn distance2(a: Vec3, b: Vec3, boxvec: &BoxVec) -> f32 {
    let d = pbc(b - a, boxvec);
    dot(d, d)
}

/// Volume of the box, as the scalar triple product of its box vectors.
pub fn volume(boxvec: &BoxVec) -> f32 {
    dot(boxvec.x_axis, cross(boxvec.y_axis, boxvec.z_axis))
}

/// Returns a uniformly distributed random point on the sphere of radius `r` around `center`.
pub fn gen_sphere_point<R: Rng + ?Sized>(rng: &mut R, center: Vec3, r: f32) -> Vec3 {
    let azimuth = rng.gen_range(0.0..2.0 * PI);
    let cos_polar: f32 = rng.gen_range(-1.0..=1.0);
    let sin_polar = (1.0 - cos_polar * cos_polar).max(0.0).sqrt();
    let direction = Vec3::new(
        sin_polar * azimuth.cos(),
        sin_polar * azimuth.sin(),
        cos_polar,
    );
    center + r * direction
}

/// Returns a uniformly distributed random point on the sphere of radius `r` around the origin.
pub fn gen_sphere_point_at_origin<R: Rng + ?Sized>(rng: &mut R, r: f32) -> Vec3 {
    gen_sphere_point(rng, Vec3::ZERO, r)
}

/// Returns a uniformly distributed random point on the unit sphere.
pub fn gen_unit_sphere_point<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    gen_sphere_point(rng, Vec3::ZERO, 1.0)
}

/// Monte-Carlo estimate of how exposed each of the `sites` is.
///
/// For every site, `rand_n` points are placed randomly on a sphere of radius `r` around it. A point
/// is accepted if it is closer to its own site than to any of the other sites. The ratio
/// `accepted / rand_n` of a site is its exposed fraction, and the sum of these ratios over all
/// sites is returned. An isolated site therefore contributes exactly one.
pub fn get_sphere_accept_ratio<R: Rng + ?Sized>(
    rng: &mut R,
    sites: &[Vec3],
    r: f32,
    rand_n: usize,
    boxvec: &BoxVec,
) -> f64 {
    if rand_n == 0 {
        return 0.0;
    }

    let mut accepted: u64 = 0;
    for (i, &site) in sites.iter().enumerate() {
        for _ in 0..rand_n {
            let point = gen_sphere_point(rng, site, r);
            let own = distance2(point, site, boxvec);
            let closest = sites
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .all(|(_, &other)| own < distance2(point, other, boxvec));
            if closest {
                accepted += 1;
            }
        }
    }

    accepted as f64 / rand_n as f64
}

/// Monte-Carlo estimate of the surface area of the union of spheres of radius `r` around `sites`.
///
/// See [`get_sphere_accept_ratio`].
pub fn get_surf_area<R: Rng + ?Sized>(
    rng: &mut R,
    sites: &[Vec3],
    r: f32,
    rand_n: usize,
    boxvec: &BoxVec,
) -> f64 {
    let ratio = get_sphere_accept_ratio(rng, sites, r, rand_n, boxvec);
    let r = r as f64;
    4.0 * std::f64::consts::PI * r * r * ratio
}
