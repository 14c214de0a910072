// src/message/geo.rs
//! Location codes derived purely from coordinates.

const OLC_ALPHABET: &[u8; 20] = b"23456789CFGHJMPQRVWX";
/// 20^3: resolution of a 10-digit plus code in degrees^-1.
const OLC_PAIR_PRECISION: f64 = 8000.0;
const OLC_PAIRS: usize = 5;
const OLC_SEPARATOR_POS: usize = 8;

pub const GEOHASH_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub lat: f64,
    pub lng: f64,
    pub plus_code: String,
    pub geohash: String,
}

impl GeoInfo {
    pub fn from_coords(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            plus_code: plus_code(lat, lng),
            geohash: geohash_of(lat, lng),
        }
    }

    /// `"lat,lng"` with six decimals.
    pub fn coord_string(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }

    /// Coarser plus-code areas: 6, 4 and 2 significant digits.
    pub fn plus_code_prefixes(&self) -> [String; 3] {
        let code = &self.plus_code;
        [
            format!("{}00+", &code[..6]),
            format!("{}0000+", &code[..4]),
            format!("{}000000+", &code[..2]),
        ]
    }
}

/// 10-digit Open Location Code, e.g. `8FW4V942+JV`. Follows the pair
/// encoding of Google's reference `encode` for code length 10.
pub fn plus_code(lat: f64, lng: f64) -> String {
    let lat = lat.clamp(-90.0, 90.0);
    let lng = normalize_lng(lng);

    let max_lat = (180.0 * OLC_PAIR_PRECISION) as i64 - 1;
    let mut lat_val = (((lat + 90.0) * OLC_PAIR_PRECISION * 1e6).round() / 1e6).floor() as i64;
    let mut lng_val = (((lng + 180.0) * OLC_PAIR_PRECISION * 1e6).round() / 1e6).floor() as i64;
    lat_val = lat_val.clamp(0, max_lat);
    lng_val = lng_val.clamp(0, (360.0 * OLC_PAIR_PRECISION) as i64 - 1);

    let mut digits = [0u8; OLC_PAIRS * 2];
    for i in (0..OLC_PAIRS).rev() {
        digits[i * 2] = OLC_ALPHABET[(lat_val % 20) as usize];
        digits[i * 2 + 1] = OLC_ALPHABET[(lng_val % 20) as usize];
        lat_val /= 20;
        lng_val /= 20;
    }

    let mut code = String::with_capacity(OLC_PAIRS * 2 + 1);
    for (i, d) in digits.iter().enumerate() {
        if i == OLC_SEPARATOR_POS {
            code.push('+');
        }
        code.push(*d as char);
    }
    code
}

/// Wraps into `[-180, 180)`. Non-finite input comes out as NaN.
fn normalize_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// 12-character geohash.
pub fn geohash_of(lat: f64, lng: f64) -> String {
    let coord = geohash::Coord {
        x: normalize_lng(lng),
        y: lat.clamp(-90.0, 90.0),
    };
    // Only fails for out-of-range input, which is clamped above.
    geohash::encode(coord, GEOHASH_LEN).unwrap_or_default()
}
