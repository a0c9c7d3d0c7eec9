// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Sky positions as they appear in source catalogs.

Catalogs give right ascension either in sexagesimal hours (`10:00:00.5`,
`10 00 00.5`, `10h00m00.5s`) or in decimal degrees, and declination in
sexagesimal degrees (`+20:00:00`, `-5d30m00s`) or decimal degrees. All
positions are J2000; no precession or frame conversion is ever needed.

 */

use std::f64::consts::PI;

use crate::{Error, Result};

const ARCSEC_PER_RADIAN: f64 = 180. * 3600. / PI;

/// A J2000 position on the sky.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyPosition {
    ra_deg: f64,
    dec_deg: f64,
}

impl SkyPosition {
    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Result<Self> {
        if !ra_deg.is_finite() || !dec_deg.is_finite() {
            return Err(Error::BadPosition(format!(
                "non-finite position ({ra_deg}, {dec_deg})"
            )));
        }

        if !(-90. ..=90.).contains(&dec_deg) {
            return Err(Error::BadPosition(format!(
                "declination {dec_deg} outside [-90, 90]"
            )));
        }

        Ok(SkyPosition {
            ra_deg: ra_deg.rem_euclid(360.),
            dec_deg,
        })
    }

    /// Parse a position from catalog text.
    ///
    /// Each coordinate is read as sexagesimal if it has field separators
    /// (colons, spaces or unit letters), and as decimal degrees otherwise.
    pub fn parse(ra: &str, dec: &str) -> Result<Self> {
        Self::from_degrees(parse_ra(ra)?, parse_dec(dec)?)
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    /// The great-circle distance to *other*, in arcseconds.
    ///
    /// Uses the Vincenty formula, which stays accurate at the sub-arcsecond
    /// separations the cross-matcher cares about as well as near the poles.
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        let (lat1, lat2) = (self.dec_deg.to_radians(), other.dec_deg.to_radians());
        let dlon = (other.ra_deg - self.ra_deg).to_radians();

        let (slat1, clat1) = lat1.sin_cos();
        let (slat2, clat2) = lat2.sin_cos();
        let (sdlon, cdlon) = dlon.sin_cos();

        let num1 = clat2 * sdlon;
        let num2 = clat1 * slat2 - slat1 * clat2 * cdlon;
        let denom = slat1 * slat2 + clat1 * clat2 * cdlon;

        num1.hypot(num2).atan2(denom) * ARCSEC_PER_RADIAN
    }
}

fn is_sexagesimal(text: &str) -> bool {
    text.contains(|c: char| c == ':' || c.is_whitespace() || "hHdDmMsS'\"".contains(c))
}

/// Split off a leading sign, returning -1 or +1 and the rest.
fn split_sign(text: &str) -> (f64, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (-1., rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (1., rest)
    } else {
        (1., text)
    }
}

/// Parse three sexagesimal fields; the sign must already be removed.
fn parse_fields(text: &str, units: &[char]) -> Result<f64> {
    let cleaned: String = text
        .chars()
        .map(|c| if c == ':' || units.contains(&c) { ' ' } else { c })
        .collect();

    let parts: Vec<&str> = cleaned.split_whitespace().collect();

    if parts.is_empty() || parts.len() > 3 {
        return Err(Error::BadPosition(format!(
            "expected 1 to 3 sexagesimal fields in \"{text}\""
        )));
    }

    let mut value = 0.;
    let mut scale = 1.;

    for (i, part) in parts.iter().enumerate() {
        let x: f64 = part
            .parse()
            .map_err(|_| Error::BadPosition(format!("bad sexagesimal field \"{part}\"")))?;

        if x < 0. || (i > 0 && x >= 60.) {
            return Err(Error::BadPosition(format!(
                "sexagesimal field \"{part}\" out of range in \"{text}\""
            )));
        }

        value += x / scale;
        scale *= 60.;
    }

    Ok(value)
}

fn parse_decimal(text: &str) -> Result<f64> {
    text.parse()
        .map_err(|_| Error::BadPosition(format!("cannot parse \"{text}\" as a coordinate")))
}

/// Parse a right ascension into degrees.
///
/// Sexagesimal values are in hours of right ascension.
pub fn parse_ra(text: &str) -> Result<f64> {
    let text = text.trim();

    if !is_sexagesimal(text) {
        return parse_decimal(text);
    }

    let (sign, rest) = split_sign(text);
    let hours = sign * parse_fields(rest, &['h', 'H', 'm', 'M', 's', 'S'])?;

    if !(0. ..24.).contains(&hours) {
        return Err(Error::BadPosition(format!(
            "right ascension \"{text}\" outside [0h, 24h)"
        )));
    }

    Ok(hours * 15.)
}

/// Parse a declination into degrees.
pub fn parse_dec(text: &str) -> Result<f64> {
    let text = text.trim();

    if !is_sexagesimal(text) {
        return parse_decimal(text);
    }

    // The sign belongs to the whole value: "-00:30:00" is half a degree south.
    let (sign, rest) = split_sign(text);
    Ok(sign * parse_fields(rest, &['d', 'D', 'm', 'M', 's', 'S', '\'', '"'])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn sexagesimal_ra() {
        assert!(close(parse_ra("10:00:00").unwrap(), 150., 1e-12));
        assert!(close(parse_ra("10 00 00.5").unwrap(), 150. + 7.5 / 3600., 1e-12));
        assert!(close(parse_ra("10h30m00s").unwrap(), 157.5, 1e-12));
        assert!(close(parse_ra("123.25").unwrap(), 123.25, 1e-12));
        assert!(parse_ra("25:00:00").is_err());
        assert!(parse_ra("10:61:00").is_err());
        assert!(parse_ra("ten").is_err());
    }

    #[test]
    fn sexagesimal_dec() {
        assert!(close(parse_dec("+20:00:00").unwrap(), 20., 1e-12));
        assert!(close(parse_dec("-00:30:00").unwrap(), -0.5, 1e-12));
        assert!(close(parse_dec("-5d30m00s").unwrap(), -5.5, 1e-12));
        assert!(close(parse_dec("45d00'36\"").unwrap(), 45.01, 1e-12));
        assert!(close(parse_dec("-12.5").unwrap(), -12.5, 1e-12));
    }

    #[test]
    fn position_validation() {
        assert!(SkyPosition::from_degrees(10., 91.).is_err());
        assert!(SkyPosition::from_degrees(f64::NAN, 0.).is_err());
        assert!(close(SkyPosition::from_degrees(-10., 0.).unwrap().ra_deg(), 350., 1e-12));
    }

    #[test]
    fn separations() {
        let a = SkyPosition::parse("10:00:00", "+20:00:00").unwrap();
        let b = SkyPosition::parse("10:00:00.5", "+20:00:00").unwrap();
        let expected = 7.5 * 20f64.to_radians().cos();
        assert!(close(a.separation_arcsec(&b), expected, 1e-6));
        assert!(close(b.separation_arcsec(&a), expected, 1e-6));

        let c = SkyPosition::from_degrees(0., 0.).unwrap();
        let d = SkyPosition::from_degrees(0., 1.).unwrap();
        assert!(close(c.separation_arcsec(&d), 3600., 1e-6));

        // Across the RA wrap.
        let e = SkyPosition::from_degrees(359.9999, 0.).unwrap();
        let f = SkyPosition::from_degrees(0.0001, 0.).unwrap();
        assert!(close(e.separation_arcsec(&f), 0.72, 1e-6));

        assert_eq!(a.separation_arcsec(&a), 0.);
    }
}
