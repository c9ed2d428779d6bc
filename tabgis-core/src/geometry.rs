//! Geometry
//!
//! Geometry values as returned by spatial databases:
//! 1. ISO WKB and PostGIS EWKB (SRID, Z and M flags)
//! 1. SpatiaLite internal BLOB (`0x00 .. 0x7C .. 0xFE`) and TinyPoint BLOB (`0x00 0x80|0x81 .. 0xFE`)
//!
//! Z and M ordinates are read and dropped, the in-memory model is planar `geo_types`.

use std::fmt::Display;

use geo_types::{
    Coord, Geometry as GeoGeometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use itertools::Itertools;
use nom::bytes::complete::{tag, take};
use nom::number::complete::{be_u8, f64 as nom_f64, i32 as nom_i32, u32 as nom_u32};
use nom::number::Endianness;
use nom::IResult;
use serde::{Deserialize, Serialize};

use crate::{CoreResult, NomError};

type PResult<'a, O> = IResult<&'a [u8], O, NomError>;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;
const EWKB_FLAGS: u32 = EWKB_Z | EWKB_M | EWKB_SRID;

const SPATIALITE_START: &[u8] = &[0x00];
const SPATIALITE_MBR_END: &[u8] = &[0x7C];
const SPATIALITE_ENTITY: &[u8] = &[0x69];
const SPATIALITE_END: &[u8] = &[0xFE];
const SPATIALITE_HEADER_LEN: usize = 39;
const SPATIALITE_COMPRESSED: u32 = 1_000_000;
const TINY_POINT_BIG: u8 = 0x80;
const TINY_POINT_LITTLE: u8 = 0x81;

/// nesting limit of multi geometries and collections
const MAX_DEPTH: usize = 32;

// ================================================================================================
// GeometryType
// ================================================================================================

/// Simple-feature geometry type. `Geometry` is the catch-all for unknown or mixed types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    const ALL: [GeometryType; 8] = [
        GeometryType::Geometry,
        GeometryType::Point,
        GeometryType::LineString,
        GeometryType::Polygon,
        GeometryType::MultiPoint,
        GeometryType::MultiLineString,
        GeometryType::MultiPolygon,
        GeometryType::GeometryCollection,
    ];

    /// OGC type code, dimension offsets (1000, 2000, 3000) are ignored
    pub fn from_code(code: i64) -> Self {
        match code.rem_euclid(1000) {
            1 => GeometryType::Point,
            2 => GeometryType::LineString,
            3 => GeometryType::Polygon,
            4 => GeometryType::MultiPoint,
            5 => GeometryType::MultiLineString,
            6 => GeometryType::MultiPolygon,
            7 => GeometryType::GeometryCollection,
            _ => GeometryType::Geometry,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            GeometryType::Geometry => 0,
            GeometryType::Point => 1,
            GeometryType::LineString => 2,
            GeometryType::Polygon => 3,
            GeometryType::MultiPoint => 4,
            GeometryType::MultiLineString => 5,
            GeometryType::MultiPolygon => 6,
            GeometryType::GeometryCollection => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Geometry => "GEOMETRY",
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// Accepts catalog spellings such as `POINT`, `ST_Point`, `POINTZ`, `POINT XY` or `MultiPolygonM`.
    pub fn from_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        let upper = upper.strip_prefix("ST_").unwrap_or(&upper);
        let head = upper.split_whitespace().next().unwrap_or_default();

        let lookup = |s: &str| Self::ALL.iter().copied().find(|t| t.name() == s);
        lookup(head)
            .or_else(|| {
                ["ZM", "Z", "M"]
                    .iter()
                    .find_map(|suffix| head.strip_suffix(suffix).and_then(|s| lookup(s)))
            })
            .unwrap_or(GeometryType::Geometry)
    }

    pub fn of(geometry: &GeoGeometry<f64>) -> Self {
        match geometry {
            GeoGeometry::Point(_) => GeometryType::Point,
            GeoGeometry::Line(_) | GeoGeometry::LineString(_) => GeometryType::LineString,
            GeoGeometry::Polygon(_) | GeoGeometry::Rect(_) | GeoGeometry::Triangle(_) => {
                GeometryType::Polygon
            }
            GeoGeometry::MultiPoint(_) => GeometryType::MultiPoint,
            GeoGeometry::MultiLineString(_) => GeometryType::MultiLineString,
            GeoGeometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            GeoGeometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ================================================================================================
// Geometry
// ================================================================================================

/// A planar geometry with an optional spatial reference id.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    srid: Option<i32>,
    geometry: GeoGeometry<f64>,
}

impl Geometry {
    pub fn new<G: Into<GeoGeometry<f64>>>(geometry: G) -> Self {
        Geometry {
            srid: None,
            geometry: geometry.into(),
        }
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    pub fn srid(&self) -> Option<i32> {
        self.srid
    }

    pub fn geometry(&self) -> &GeoGeometry<f64> {
        &self.geometry
    }

    pub fn into_inner(self) -> GeoGeometry<f64> {
        self.geometry
    }

    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::of(&self.geometry)
    }

    /// Decode either a SpatiaLite blob or (E)WKB, detected from the blob's framing bytes.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if is_tiny_point(bytes) || is_spatialite_blob(bytes) {
            Self::from_spatialite(bytes)
        } else {
            Self::from_wkb(bytes)
        }
    }

    pub fn from_wkb(bytes: &[u8]) -> CoreResult<Self> {
        let (_, g) = wkb(bytes, 0)?;
        Ok(g)
    }

    pub fn from_spatialite(bytes: &[u8]) -> CoreResult<Self> {
        let (_, g) = if is_tiny_point(bytes) {
            tiny_point(bytes)?
        } else {
            spatialite(bytes)?
        };
        Ok(g)
    }

    /// little-endian ISO WKB, 2D, without SRID
    pub fn to_wkb(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_wkb(&mut buf, &self.geometry, None);
        buf
    }

    /// little-endian EWKB, SRID embedded when known
    pub fn to_ewkb(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_wkb(&mut buf, &self.geometry, self.srid);
        buf
    }

    pub fn to_wkt(&self) -> String {
        wkt(&self.geometry)
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.srid {
            Some(srid) => write!(f, "SRID={};{}", srid, self.to_wkt()),
            None => write!(f, "{}", self.to_wkt()),
        }
    }
}

impl From<GeoGeometry<f64>> for Geometry {
    fn from(g: GeoGeometry<f64>) -> Self {
        Geometry::new(g)
    }
}

/// ordinates of a TinyPoint class: XY, XYZ, XYM, XYZM
fn tiny_point_dims(class: u8) -> Option<usize> {
    match class {
        1 => Some(2),
        2 | 3 => Some(3),
        4 => Some(4),
        _ => None,
    }
}

/// start, byte order, SRID, class, ordinates, end
fn is_tiny_point(bytes: &[u8]) -> bool {
    bytes.len() > 7
        && bytes[0] == SPATIALITE_START[0]
        && matches!(bytes[1], TINY_POINT_BIG | TINY_POINT_LITTLE)
        && bytes[bytes.len() - 1] == SPATIALITE_END[0]
        && tiny_point_dims(bytes[6]).is_some_and(|d| bytes.len() == 8 + d * 8)
}

fn is_spatialite_blob(bytes: &[u8]) -> bool {
    bytes.len() > SPATIALITE_HEADER_LEN + 4
        && bytes[0] == SPATIALITE_START[0]
        && bytes[SPATIALITE_HEADER_LEN - 1] == SPATIALITE_MBR_END[0]
        && bytes[bytes.len() - 1] == SPATIALITE_END[0]
}

// ================================================================================================
// Binary parsers
// ================================================================================================

#[derive(Debug, Clone, Copy)]
enum Flavor {
    Wkb,
    Spatialite,
}

fn failure<O>(msg: String) -> PResult<'static, O> {
    Err(nom::Err::Failure(NomError::new(msg)))
}

fn marker<'a>(input: &'a [u8], m: &'static [u8]) -> PResult<'a, &'a [u8]> {
    tag(m)(input)
}

fn skip(input: &[u8], n: usize) -> PResult<'_, &[u8]> {
    take(n)(input)
}

fn read_u32(input: &[u8], e: Endianness) -> PResult<'_, u32> {
    nom_u32(e)(input)
}

fn read_i32(input: &[u8], e: Endianness) -> PResult<'_, i32> {
    nom_i32(e)(input)
}

fn read_f64(input: &[u8], e: Endianness) -> PResult<'_, f64> {
    nom_f64(e)(input)
}

fn byte_order(input: &[u8]) -> PResult<'_, Endianness> {
    let (rest, b) = be_u8::<_, NomError>(input)?;
    match b {
        0 => Ok((rest, Endianness::Big)),
        1 => Ok((rest, Endianness::Little)),
        _ => failure(format!("invalid byte order marker {b:#04x}")),
    }
}

/// element count guarded against the remaining blob size
fn read_count(input: &[u8], e: Endianness, min_item: usize) -> PResult<'_, usize> {
    let (rest, n) = read_u32(input, e)?;
    let n = n as usize;
    if n.saturating_mul(min_item) > rest.len() {
        return failure(format!("element count {n} exceeds blob size"));
    }
    Ok((rest, n))
}

/// split a raw type word into (base code, ordinate count)
fn decode_type_code(raw: u32) -> (u32, usize) {
    let mut dims = 2;
    if raw & EWKB_Z != 0 {
        dims += 1;
    }
    if raw & EWKB_M != 0 {
        dims += 1;
    }
    let base = raw & !EWKB_FLAGS;
    dims += match base / 1000 {
        1 | 2 => 1,
        3 => 2,
        _ => 0,
    };
    (base % 1000, dims)
}

fn coord(input: &[u8], e: Endianness, dims: usize) -> PResult<'_, Coord<f64>> {
    let (input, x) = read_f64(input, e)?;
    let (input, y) = read_f64(input, e)?;
    let (input, _) = skip(input, (dims - 2) * 8)?;
    Ok((input, Coord { x, y }))
}

fn line_string(input: &[u8], e: Endianness, dims: usize) -> PResult<'_, LineString<f64>> {
    let (mut input, n) = read_count(input, e, dims * 8)?;
    let mut coords = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, c) = coord(input, e, dims)?;
        coords.push(c);
        input = rest;
    }
    Ok((input, LineString::new(coords)))
}

fn polygon(input: &[u8], e: Endianness, dims: usize) -> PResult<'_, Polygon<f64>> {
    let (mut input, n) = read_count(input, e, 4)?;
    let mut rings = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, ring) = line_string(input, e, dims)?;
        rings.push(ring);
        input = rest;
    }
    let mut rings = rings.into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Ok((input, Polygon::new(exterior, rings.collect())))
}

/// one member of a multi geometry or collection
fn member(
    input: &[u8],
    e: Endianness,
    flavor: Flavor,
    depth: usize,
) -> PResult<'_, GeoGeometry<f64>> {
    match flavor {
        Flavor::Wkb => wkb(input, depth).map(|(rest, g)| (rest, g.geometry)),
        Flavor::Spatialite => {
            let (input, _) = marker(input, SPATIALITE_ENTITY)?;
            let (input, raw) = read_u32(input, e)?;
            let (code, dims) = decode_type_code(raw);
            body(input, e, code, dims, flavor, depth)
        }
    }
}

fn members(
    input: &[u8],
    e: Endianness,
    flavor: Flavor,
    depth: usize,
) -> PResult<'_, Vec<GeoGeometry<f64>>> {
    let depth = depth + 1;
    if depth > MAX_DEPTH {
        return failure(format!("geometry nested deeper than {MAX_DEPTH} levels"));
    }
    let (mut input, n) = read_count(input, e, 5)?;
    let mut parts = Vec::with_capacity(n);
    for _ in 0..n {
        let (rest, g) = member(input, e, flavor, depth)?;
        parts.push(g);
        input = rest;
    }
    Ok((input, parts))
}

fn narrow<T>(parts: Vec<GeoGeometry<f64>>, expected: &str) -> Result<Vec<T>, nom::Err<NomError>>
where
    T: TryFrom<GeoGeometry<f64>>,
{
    parts
        .into_iter()
        .map(T::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| nom::Err::Failure(NomError::new(format!("expected {expected} members"))))
}

fn body(
    input: &[u8],
    e: Endianness,
    code: u32,
    dims: usize,
    flavor: Flavor,
    depth: usize,
) -> PResult<'_, GeoGeometry<f64>> {
    match code {
        1 => coord(input, e, dims).map(|(rest, c)| (rest, Point(c).into())),
        2 => line_string(input, e, dims).map(|(rest, l)| (rest, l.into())),
        3 => polygon(input, e, dims).map(|(rest, p)| (rest, p.into())),
        4 => {
            let (rest, parts) = members(input, e, flavor, depth)?;
            let points = narrow::<Point<f64>>(parts, "point")?;
            Ok((rest, MultiPoint::new(points).into()))
        }
        5 => {
            let (rest, parts) = members(input, e, flavor, depth)?;
            let lines = narrow::<LineString<f64>>(parts, "linestring")?;
            Ok((rest, MultiLineString::new(lines).into()))
        }
        6 => {
            let (rest, parts) = members(input, e, flavor, depth)?;
            let polygons = narrow::<Polygon<f64>>(parts, "polygon")?;
            Ok((rest, MultiPolygon::new(polygons).into()))
        }
        7 => {
            let (rest, parts) = members(input, e, flavor, depth)?;
            Ok((rest, GeoGeometry::GeometryCollection(GeometryCollection::new_from(parts))))
        }
        c => failure(format!("unsupported geometry type code {c}")),
    }
}

fn wkb(input: &[u8], depth: usize) -> PResult<'_, Geometry> {
    let (input, e) = byte_order(input)?;
    let (input, raw) = read_u32(input, e)?;
    let (code, dims) = decode_type_code(raw);
    let (input, srid) = if raw & EWKB_SRID != 0 {
        let (rest, srid) = read_i32(input, e)?;
        (rest, Some(srid))
    } else {
        (input, None)
    };
    let (input, geometry) = body(input, e, code, dims, Flavor::Wkb, depth)?;
    Ok((input, Geometry { srid, geometry }))
}

fn spatialite(input: &[u8]) -> PResult<'_, Geometry> {
    let (input, _) = marker(input, SPATIALITE_START)?;
    let (input, e) = byte_order(input)?;
    let (input, srid) = read_i32(input, e)?;
    // MBR: min x, min y, max x, max y
    let (input, _) = skip(input, 32)?;
    let (input, _) = marker(input, SPATIALITE_MBR_END)?;
    let (input, raw) = read_u32(input, e)?;
    if raw >= SPATIALITE_COMPRESSED {
        return failure(format!("compressed SpatiaLite geometry class {raw}"));
    }
    let (code, dims) = decode_type_code(raw);
    let (input, geometry) = body(input, e, code, dims, Flavor::Spatialite, 0)?;
    let (input, _) = marker(input, SPATIALITE_END)?;
    let srid = (srid != 0).then_some(srid);
    Ok((input, Geometry { srid, geometry }))
}

fn tiny_point(input: &[u8]) -> PResult<'_, Geometry> {
    let (input, _) = marker(input, SPATIALITE_START)?;
    let (input, order) = be_u8::<_, NomError>(input)?;
    let e = match order {
        TINY_POINT_BIG => Endianness::Big,
        TINY_POINT_LITTLE => Endianness::Little,
        b => return failure(format!("invalid TinyPoint byte order {b:#04x}")),
    };
    let (input, srid) = read_i32(input, e)?;
    let (input, class) = be_u8::<_, NomError>(input)?;
    let Some(dims) = tiny_point_dims(class) else {
        return failure(format!("invalid TinyPoint class {class}"));
    };
    let (input, c) = coord(input, e, dims)?;
    let (input, _) = marker(input, SPATIALITE_END)?;
    let srid = (srid != 0).then_some(srid);
    Ok((
        input,
        Geometry {
            srid,
            geometry: Point(c).into(),
        },
    ))
}

// ================================================================================================
// Writers
// ================================================================================================

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_coord(buf: &mut Vec<u8>, c: &Coord<f64>) {
    buf.extend_from_slice(&c.x.to_le_bytes());
    buf.extend_from_slice(&c.y.to_le_bytes());
}

fn write_ring(buf: &mut Vec<u8>, l: &LineString<f64>) {
    write_u32(buf, l.0.len() as u32);
    l.0.iter().for_each(|c| write_coord(buf, c));
}

fn write_polygon(buf: &mut Vec<u8>, p: &Polygon<f64>) {
    let rings = if p.exterior().0.is_empty() {
        0
    } else {
        1 + p.interiors().len()
    };
    write_u32(buf, rings as u32);
    if rings > 0 {
        write_ring(buf, p.exterior());
        p.interiors().iter().for_each(|r| write_ring(buf, r));
    }
}

fn write_wkb(buf: &mut Vec<u8>, g: &GeoGeometry<f64>, srid: Option<i32>) {
    buf.push(1);
    let code = GeometryType::of(g).code();
    match srid {
        Some(srid) => {
            write_u32(buf, code | EWKB_SRID);
            buf.extend_from_slice(&srid.to_le_bytes());
        }
        None => write_u32(buf, code),
    }
    match g {
        GeoGeometry::Point(p) => write_coord(buf, &p.0),
        GeoGeometry::Line(l) => {
            write_u32(buf, 2);
            write_coord(buf, &l.start);
            write_coord(buf, &l.end);
        }
        GeoGeometry::LineString(l) => write_ring(buf, l),
        GeoGeometry::Polygon(p) => write_polygon(buf, p),
        GeoGeometry::Rect(r) => write_polygon(buf, &r.to_polygon()),
        GeoGeometry::Triangle(t) => write_polygon(buf, &t.to_polygon()),
        GeoGeometry::MultiPoint(mp) => {
            write_u32(buf, mp.0.len() as u32);
            mp.0.iter()
                .for_each(|p| write_wkb(buf, &GeoGeometry::Point(*p), None));
        }
        GeoGeometry::MultiLineString(ml) => {
            write_u32(buf, ml.0.len() as u32);
            ml.0.iter()
                .for_each(|l| write_wkb(buf, &GeoGeometry::LineString(l.clone()), None));
        }
        GeoGeometry::MultiPolygon(mp) => {
            write_u32(buf, mp.0.len() as u32);
            mp.0.iter()
                .for_each(|p| write_wkb(buf, &GeoGeometry::Polygon(p.clone()), None));
        }
        GeoGeometry::GeometryCollection(gc) => {
            write_u32(buf, gc.0.len() as u32);
            gc.0.iter().for_each(|g| write_wkb(buf, g, None));
        }
    }
}

fn coord_text(c: &Coord<f64>) -> String {
    format!("{} {}", c.x, c.y)
}

fn coords_text(coords: &[Coord<f64>]) -> String {
    if coords.is_empty() {
        " EMPTY".to_string()
    } else {
        format!("({})", coords.iter().map(coord_text).join(", "))
    }
}

fn polygon_text(p: &Polygon<f64>) -> String {
    if p.exterior().0.is_empty() {
        return " EMPTY".to_string();
    }
    let rings = std::iter::once(p.exterior())
        .chain(p.interiors())
        .map(|r| coords_text(&r.0))
        .join(", ");
    format!("({rings})")
}

fn group_text<T, F>(items: &[T], f: F) -> String
where
    F: Fn(&T) -> String,
{
    if items.is_empty() {
        " EMPTY".to_string()
    } else {
        format!("({})", items.iter().map(f).join(", "))
    }
}

fn wkt(g: &GeoGeometry<f64>) -> String {
    match g {
        GeoGeometry::Point(p) => format!("POINT({})", coord_text(&p.0)),
        GeoGeometry::Line(l) => format!("LINESTRING{}", coords_text(&[l.start, l.end])),
        GeoGeometry::LineString(l) => format!("LINESTRING{}", coords_text(&l.0)),
        GeoGeometry::Polygon(p) => format!("POLYGON{}", polygon_text(p)),
        GeoGeometry::Rect(r) => format!("POLYGON{}", polygon_text(&r.to_polygon())),
        GeoGeometry::Triangle(t) => format!("POLYGON{}", polygon_text(&t.to_polygon())),
        GeoGeometry::MultiPoint(mp) => {
            format!("MULTIPOINT{}", group_text(&mp.0, |p| format!("({})", coord_text(&p.0))))
        }
        GeoGeometry::MultiLineString(ml) => {
            format!("MULTILINESTRING{}", group_text(&ml.0, |l| coords_text(&l.0)))
        }
        GeoGeometry::MultiPolygon(mp) => format!("MULTIPOLYGON{}", group_text(&mp.0, polygon_text)),
        GeoGeometry::GeometryCollection(gc) => {
            format!("GEOMETRYCOLLECTION{}", group_text(&gc.0, wkt))
        }
    }
}

#[cfg(test)]
mod test_geometry {
    use geo_types::{line_string, point, polygon};

    use super::*;
    use crate::CoreError;

    /// EWKB of `SRID=4326;POINT(1 2)`, little-endian
    const EWKB_POINT: &str = "0101000020E6100000000000000000F03F0000000000000040";

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn spatialite_point(x: f64, y: f64, srid: i32) -> Vec<u8> {
        let mut b = vec![0x00, 0x01];
        b.extend_from_slice(&srid.to_le_bytes());
        for v in [x, y, x, y] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.push(0x7C);
        b.extend_from_slice(&1i32.to_le_bytes());
        b.extend_from_slice(&x.to_le_bytes());
        b.extend_from_slice(&y.to_le_bytes());
        b.push(0xFE);
        b
    }

    #[test]
    fn decode_ewkb_point_with_srid() {
        let g = Geometry::from_bytes(&hex(EWKB_POINT)).unwrap();
        assert_eq!(g.srid(), Some(4326));
        assert_eq!(g.geometry(), &GeoGeometry::Point(point!(x: 1.0, y: 2.0)));
        assert_eq!(g.to_string(), "SRID=4326;POINT(1 2)");
    }

    #[test]
    fn decode_iso_wkb_with_z() {
        // POINT Z (1 2 3), big-endian
        let mut b = vec![0x00];
        b.extend_from_slice(&1001u32.to_be_bytes());
        for v in [1.0f64, 2.0, 3.0] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        let g = Geometry::from_wkb(&b).unwrap();
        assert_eq!(g.geometry_type(), GeometryType::Point);
        assert_eq!(g.to_wkt(), "POINT(1 2)");
    }

    #[test]
    fn decode_spatialite_blob() {
        let g = Geometry::from_bytes(&spatialite_point(3.5, -1.0, 2154)).unwrap();
        assert_eq!(g.srid(), Some(2154));
        assert_eq!(g.to_wkt(), "POINT(3.5 -1)");
    }

    #[test]
    fn wkb_writer_is_read_back() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 0.0)];
        let multi = GeoGeometry::MultiLineString(MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            line_string![(x: 2.0, y: 2.0), (x: 3.0, y: 5.0)],
        ]));

        for g in [GeoGeometry::Polygon(poly), multi] {
            let geom = Geometry::new(g.clone()).with_srid(3857);
            let back = Geometry::from_bytes(&geom.to_ewkb()).unwrap();
            assert_eq!(back, geom);
            let back = Geometry::from_bytes(&geom.to_wkb()).unwrap();
            assert_eq!(back.geometry(), &g);
            assert_eq!(back.srid(), None);
        }
    }

    #[test]
    fn truncated_blob_is_an_error() {
        let b = hex(EWKB_POINT);
        let e = Geometry::from_bytes(&b[..b.len() - 3]).unwrap_err();
        assert!(matches!(e, CoreError::Geometry(_)));

        // declared count larger than the payload
        let mut b = vec![0x01];
        b.extend_from_slice(&2u32.to_le_bytes());
        b.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(Geometry::from_wkb(&b).is_err());
    }

    #[test]
    fn decode_tiny_point() {
        let mut b = vec![0x00, 0x81];
        b.extend_from_slice(&4326i32.to_le_bytes());
        b.push(0x01);
        for v in [1.5f64, -2.0] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.push(0xFE);
        let g = Geometry::from_bytes(&b).unwrap();
        assert_eq!(g.srid(), Some(4326));
        assert_eq!(g.to_wkt(), "POINT(1.5 -2)");

        // XYZ, big-endian, no SRID
        let mut b = vec![0x00, 0x80];
        b.extend_from_slice(&0i32.to_be_bytes());
        b.push(0x02);
        for v in [1.0f64, 2.0, 3.0] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        b.push(0xFE);
        let g = Geometry::from_bytes(&b).unwrap();
        assert_eq!(g.srid(), None);
        assert_eq!(g.to_wkt(), "POINT(1 2)");
    }

    #[test]
    fn deeply_nested_collections_are_rejected() {
        fn nested(levels: usize) -> Vec<u8> {
            let mut b = vec![];
            for _ in 0..levels {
                b.push(0x01);
                b.extend_from_slice(&7u32.to_le_bytes());
                b.extend_from_slice(&1u32.to_le_bytes());
            }
            b.push(0x01);
            b.extend_from_slice(&1u32.to_le_bytes());
            b.extend_from_slice(&1.0f64.to_le_bytes());
            b.extend_from_slice(&2.0f64.to_le_bytes());
            b
        }

        let g = Geometry::from_wkb(&nested(3)).unwrap();
        assert_eq!(g.geometry_type(), GeometryType::GeometryCollection);
        assert!(Geometry::from_wkb(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(
            Geometry::from_wkb(&nested(10_000)),
            Err(CoreError::Geometry(_))
        ));
    }

    #[test]
    fn geometry_type_names() {
        assert_eq!(GeometryType::from_name("POINT"), GeometryType::Point);
        assert_eq!(GeometryType::from_name("ST_MultiPolygon"), GeometryType::MultiPolygon);
        assert_eq!(GeometryType::from_name("LINESTRINGZ"), GeometryType::LineString);
        assert_eq!(GeometryType::from_name("POLYGON XYZ"), GeometryType::Polygon);
        assert_eq!(GeometryType::from_name("circle"), GeometryType::Geometry);
        assert_eq!(GeometryType::from_code(3006), GeometryType::MultiPolygon);
        assert_eq!(GeometryType::from_code(0), GeometryType::Geometry);
    }
}
