//! GDS-II stream reader and writer.
//!
//! Each record is `[u16 length][u8 record type][u8 data type][payload]`, all
//! big-endian. A library is `HEADER BGNLIB LIBNAME UNITS (BGNSTR ... ENDSTR)* ENDLIB`;
//! every structure becomes one [`Cell`], and every BOUNDARY, BOX and PATH
//! keeps its `(layer, datatype)` pair.

use std::io::{self, Read};
use thiserror::Error;

use layer3d_core::cell::{Cell, CellInstance, Transform};
use layer3d_core::database::LayoutDatabase;
use layer3d_core::geometry::{GeomPrimitive, Path as LayoutPath, Point, Polygon, Rect};
use layer3d_core::LayerKey;

#[allow(dead_code)]
mod record_type {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const PATH: u16 = 0x0900;
    pub const SREF: u16 = 0x0A00;
    pub const AREF: u16 = 0x0B00;
    pub const TEXT: u16 = 0x0C00;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const WIDTH: u16 = 0x0F03;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
    pub const SNAME: u16 = 0x1206;
    pub const COLROW: u16 = 0x1302;
    pub const NODE: u16 = 0x1500;
    pub const STRANS: u16 = 0x1A01;
    pub const MAG: u16 = 0x1B05;
    pub const ANGLE: u16 = 0x1C05;
    pub const PATHTYPE: u16 = 0x2102;
    pub const BOX: u16 = 0x2D00;
    pub const BOXTYPE: u16 = 0x2E02;
}

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },

    #[error("Stream ended inside {0}")]
    Truncated(&'static str),

    #[error("Invalid coordinate data in {0}")]
    InvalidCoordinates(&'static str),
}

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    data: Vec<u8>,
}

impl GdsRecord {
    fn as_i16_vec(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    fn as_i32_vec(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn as_string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    fn as_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| gds_real8_to_f64(&[c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    }

    fn first_i16(&self) -> Option<i16> {
        self.as_i16_vec().first().copied()
    }

    fn first_f64(&self) -> Option<f64> {
        self.as_f64_vec().first().copied()
    }
}

/// Convert GDS-II excess-64 real format to IEEE 754 f64.
fn gds_real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut mantissa: u64 = 0;
    for &b in &bytes[1..] {
        mantissa = (mantissa << 8) | (b as u64);
    }

    let mantissa_f = mantissa as f64 / (1u64 << 56) as f64;
    sign * mantissa_f * 16.0_f64.powi(exponent)
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Normalize so that 1/16 <= mantissa < 1.
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mantissa = (val * (1u64 << 56) as f64).round() as u64;
    let mut result = mantissa.to_be_bytes();
    result[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    result
}

/// Records collected between an element's opening record and its ENDEL.
#[derive(Debug, Default)]
struct Element {
    layer: u16,
    datatype: u16,
    width: i32,
    pathtype: i16,
    sname: String,
    strans: i16,
    mag: Option<f64>,
    angle: Option<f64>,
    colrow: Option<(i16, i16)>,
    xy: Vec<i32>,
}

// ── Reader ────────────────────────────────────────────────────────────

pub struct GdsReader<R: Read> {
    reader: R,
    offset: u64,
    /// Size of one database unit in user units.
    user_per_db: f64,
}

impl<R: Read> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            user_per_db: 0.001,
        }
    }

    /// Read the entire stream into a [`LayoutDatabase`], coordinates in user units.
    pub fn read(&mut self) -> Result<LayoutDatabase, GdsError> {
        let mut db = LayoutDatabase::new("imported");

        self.read_header()?;
        self.read_lib(&mut db)?;

        Ok(db)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }

        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(GdsError::InvalidRecord {
                offset: self.offset,
                message: format!("Record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.reader.read_exact(&mut type_buf)?;
        let record_type = u16::from_be_bytes(type_buf);

        let mut data = vec![0u8; total_len - 4];
        self.reader.read_exact(&mut data)?;
        self.offset += total_len as u64;

        Ok(Some(GdsRecord { record_type, data }))
    }

    fn next_record(&mut self, context: &'static str) -> Result<GdsRecord, GdsError> {
        self.read_record()?.ok_or(GdsError::Truncated(context))
    }

    fn read_header(&mut self) -> Result<(), GdsError> {
        let rec = self.read_record()?.ok_or(GdsError::InvalidRecord {
            offset: 0,
            message: "Empty file".into(),
        })?;

        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }

        if let Some(version) = rec.first_i16() {
            log::debug!("GDS-II version: {}", version);
        }
        Ok(())
    }

    fn read_lib(&mut self, db: &mut LayoutDatabase) -> Result<(), GdsError> {
        loop {
            let rec = self.next_record("library")?;
            match rec.record_type {
                record_type::LIBNAME => {
                    db.name = rec.as_string();
                }
                record_type::UNITS => {
                    let units = rec.as_f64_vec();
                    if let &[user_per_db, db_in_m, ..] = &units[..] {
                        if user_per_db > 0.0 && db_in_m > 0.0 {
                            self.user_per_db = user_per_db;
                            db.user_unit_m = db_in_m / user_per_db;
                        }
                        log::debug!(
                            "Database unit: {} user units, {} m",
                            user_per_db,
                            db_in_m
                        );
                    }
                }
                record_type::BGNSTR => {
                    let cell = self.read_structure()?;
                    db.add_cell(cell);
                }
                record_type::ENDLIB => {
                    log::info!("Library '{}': {} cells read", db.name, db.cell_count());
                    log::debug!("Cells: {}", db.cell_names().join(", "));
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    fn read_structure(&mut self) -> Result<Cell, GdsError> {
        let mut cell = Cell::new("unnamed");

        loop {
            let rec = self.next_record("structure")?;
            match rec.record_type {
                record_type::STRNAME => {
                    cell.name = rec.as_string();
                }
                record_type::BOUNDARY => {
                    let el = self.read_element()?;
                    if let Some(geom) = self.boundary(el)? {
                        cell.add_geometry(geom);
                    }
                }
                record_type::BOX => {
                    let el = self.read_element()?;
                    if let Some(geom) = self.boxed(el) {
                        cell.add_geometry(geom);
                    }
                }
                record_type::PATH => {
                    let el = self.read_element()?;
                    if let Some(geom) = self.path(el)? {
                        cell.add_geometry(geom);
                    }
                }
                record_type::SREF => {
                    let el = self.read_element()?;
                    if let Some(inst) = self.sref(el)? {
                        cell.add_instance(inst);
                    }
                }
                record_type::AREF => {
                    let el = self.read_element()?;
                    for inst in self.aref(el)? {
                        cell.add_instance(inst);
                    }
                }
                record_type::TEXT | record_type::NODE => {
                    self.read_element()?;
                }
                record_type::ENDSTR => break,
                _ => {}
            }
        }

        log::debug!(
            "Cell '{}': {} shapes, {} references",
            cell.name,
            cell.geometry_count(),
            cell.instance_count()
        );
        Ok(cell)
    }

    fn read_element(&mut self) -> Result<Element, GdsError> {
        let mut el = Element::default();
        loop {
            let rec = self.next_record("element")?;
            match rec.record_type {
                record_type::LAYER => el.layer = rec.first_i16().unwrap_or(0) as u16,
                record_type::DATATYPE | record_type::BOXTYPE => {
                    el.datatype = rec.first_i16().unwrap_or(0) as u16
                }
                record_type::WIDTH => el.width = rec.as_i32_vec().first().copied().unwrap_or(0),
                record_type::PATHTYPE => el.pathtype = rec.first_i16().unwrap_or(0),
                record_type::SNAME => el.sname = rec.as_string(),
                record_type::STRANS => el.strans = rec.first_i16().unwrap_or(0),
                record_type::MAG => el.mag = rec.first_f64(),
                record_type::ANGLE => el.angle = rec.first_f64(),
                record_type::COLROW => {
                    if let &[cols, rows, ..] = &rec.as_i16_vec()[..] {
                        el.colrow = Some((cols, rows));
                    }
                }
                record_type::XY => el.xy = rec.as_i32_vec(),
                record_type::ENDEL => return Ok(el),
                _ => {}
            }
        }
    }

    fn points(&self, xy: &[i32]) -> Vec<Point> {
        xy.chunks_exact(2)
            .map(|pair| {
                Point::new(
                    pair[0] as f64 * self.user_per_db,
                    pair[1] as f64 * self.user_per_db,
                )
            })
            .collect()
    }

    fn boundary(&self, el: Element) -> Result<Option<GeomPrimitive>, GdsError> {
        let mut points = self.points(&el.xy);
        // Boundaries repeat the first point at the end.
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.is_empty() {
            return Ok(None);
        }
        if points.len() < 3 {
            return Err(GdsError::InvalidCoordinates("BOUNDARY"));
        }
        let key: LayerKey = (el.layer, el.datatype);
        Ok(Some(GeomPrimitive::Polygon(Polygon::new(key, points))))
    }

    fn boxed(&self, el: Element) -> Option<GeomPrimitive> {
        let points = self.points(&el.xy);
        let first = points.first()?;
        let (mut lo, mut hi) = (*first, *first);
        for p in &points[1..] {
            lo = Point::new(lo.x.min(p.x), lo.y.min(p.y));
            hi = Point::new(hi.x.max(p.x), hi.y.max(p.y));
        }
        Some(GeomPrimitive::Rect(Rect::new(
            (el.layer, el.datatype),
            lo.x,
            lo.y,
            hi.x,
            hi.y,
        )))
    }

    fn path(&self, el: Element) -> Result<Option<GeomPrimitive>, GdsError> {
        let points = self.points(&el.xy);
        if points.is_empty() {
            return Ok(None);
        }
        if el.pathtype != 0 {
            log::debug!(
                "Path on {}/{} has pathtype {}; drawing flush ends",
                el.layer,
                el.datatype,
                el.pathtype
            );
        }
        // Negative widths are absolute (not scaled by MAG); the magnitude is what matters here.
        let width = (el.width as f64).abs() * self.user_per_db;
        Ok(Some(GeomPrimitive::Path(LayoutPath::new(
            (el.layer, el.datatype),
            points,
            width,
        ))))
    }

    fn transform(el: &Element) -> Transform {
        Transform {
            offset: Point::new(0.0, 0.0),
            rotation: el.angle.unwrap_or(0.0),
            mirror_x: el.strans as u16 & 0x8000 != 0,
            scale: el.mag.unwrap_or(1.0),
        }
    }

    fn sref(&self, el: Element) -> Result<Option<CellInstance>, GdsError> {
        if el.sname.is_empty() {
            return Ok(None);
        }
        let origin = *self
            .points(&el.xy)
            .first()
            .ok_or(GdsError::InvalidCoordinates("SREF"))?;
        let mut transform = Self::transform(&el);
        transform.offset = origin;
        Ok(Some(CellInstance::new(&el.sname, transform)))
    }

    /// Expand an array reference into one instance per row and column.
    fn aref(&self, el: Element) -> Result<Vec<CellInstance>, GdsError> {
        if el.sname.is_empty() {
            return Ok(Vec::new());
        }
        let points = self.points(&el.xy);
        let (Some((cols, rows)), &[origin, col_end, row_end, ..]) = (el.colrow, &points[..]) else {
            return Err(GdsError::InvalidCoordinates("AREF"));
        };
        if cols <= 0 || rows <= 0 {
            return Err(GdsError::InvalidCoordinates("AREF"));
        }

        let col_step = origin.to(&col_end);
        let col_step = Point::new(col_step.x / cols as f64, col_step.y / cols as f64);
        let row_step = origin.to(&row_end);
        let row_step = Point::new(row_step.x / rows as f64, row_step.y / rows as f64);

        let base = Self::transform(&el);
        let mut instances = Vec::with_capacity(cols as usize * rows as usize);
        for r in 0..rows {
            for c in 0..cols {
                let mut transform = base;
                transform.offset = origin.translate(
                    c as f64 * col_step.x + r as f64 * row_step.x,
                    c as f64 * col_step.y + r as f64 * row_step.y,
                );
                instances.push(CellInstance::new(&el.sname, transform));
            }
        }
        Ok(instances)
    }
}

// ── Writer ────────────────────────────────────────────────────────────

pub struct GdsWriter<W: io::Write> {
    writer: W,
    /// Size of one database unit in user units.
    user_per_db: f64,
}

impl<W: io::Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            user_per_db: 0.001,
        }
    }

    /// Write a [`LayoutDatabase`] as a GDS-II stream.
    pub fn write(&mut self, db: &LayoutDatabase) -> Result<(), GdsError> {
        self.write_i16_record(record_type::HEADER, &[600])?;
        self.write_i16_record(record_type::BGNLIB, &[0; 12])?;
        self.write_string_record(record_type::LIBNAME, &db.name)?;
        self.write_real8_record(
            record_type::UNITS,
            &[self.user_per_db, self.user_per_db * db.user_unit_m],
        )?;

        for cell in db.all_cells() {
            self.write_cell(cell)?;
        }

        self.write_record(record_type::ENDLIB, &[])
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = (data.len() + 4) as u16;
        self.writer.write_all(&total_len.to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        // Strings are padded to an even length.
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn write_layer(&mut self, key: LayerKey) -> Result<(), GdsError> {
        self.write_i16_record(record_type::LAYER, &[key.0 as i16])?;
        self.write_i16_record(record_type::DATATYPE, &[key.1 as i16])
    }

    fn coords(&self, points: &[Point]) -> Vec<i32> {
        points
            .iter()
            .flat_map(|p| {
                [
                    (p.x / self.user_per_db).round() as i32,
                    (p.y / self.user_per_db).round() as i32,
                ]
            })
            .collect()
    }

    fn write_cell(&mut self, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &[0; 12])?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;

        for geom in &cell.geometries {
            match geom {
                GeomPrimitive::Rect(rect) => self.write_boundary(rect.layer, &rect.ring())?,
                GeomPrimitive::Polygon(poly) => self.write_boundary(poly.layer, &poly.vertices)?,
                GeomPrimitive::Path(path) => self.write_path(path)?,
            }
        }

        for inst in &cell.instances {
            self.write_sref(inst)?;
        }

        self.write_record(record_type::ENDSTR, &[])
    }

    fn write_boundary(&mut self, key: LayerKey, ring: &[Point]) -> Result<(), GdsError> {
        let mut closed = ring.to_vec();
        if let Some(first) = ring.first() {
            closed.push(*first);
        }
        let coords = self.coords(&closed);

        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_layer(key)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_path(&mut self, path: &LayoutPath) -> Result<(), GdsError> {
        let width = (path.width / self.user_per_db).round() as i32;
        let coords = self.coords(&path.points);

        self.write_record(record_type::PATH, &[])?;
        self.write_layer(path.layer)?;
        self.write_i32_record(record_type::WIDTH, &[width])?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_sref(&mut self, inst: &CellInstance) -> Result<(), GdsError> {
        let t = &inst.transform;

        self.write_record(record_type::SREF, &[])?;
        self.write_string_record(record_type::SNAME, &inst.cell_name)?;
        if t.mirror_x || t.rotation != 0.0 || t.scale != 1.0 {
            let flags = if t.mirror_x { i16::MIN } else { 0 };
            self.write_i16_record(record_type::STRANS, &[flags])?;
        }
        if t.scale != 1.0 {
            self.write_real8_record(record_type::MAG, &[t.scale])?;
        }
        if t.rotation != 0.0 {
            self.write_real8_record(record_type::ANGLE, &[t.rotation])?;
        }
        let coords = self.coords(&[t.offset]);
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(db: &LayoutDatabase) -> LayoutDatabase {
        let mut buffer: Vec<u8> = Vec::new();
        GdsWriter::new(&mut buffer).write(db).unwrap();
        GdsReader::new(Cursor::new(buffer)).read().unwrap()
    }

    fn close(a: Point, b: Point) -> bool {
        a.distance_to(&b) < 1e-9
    }

    fn raw_record(record_type: u16, data: &[u8]) -> Vec<u8> {
        let mut out = ((data.len() + 4) as u16).to_be_bytes().to_vec();
        out.extend(record_type.to_be_bytes());
        out.extend(data);
        out
    }

    #[test]
    fn test_gds_real8_roundtrip() {
        let values = [0.0, 1.0, -1.0, 0.001, 1e-9, 3.14159, 1000.0];
        for &v in &values {
            let result = gds_real8_to_f64(&f64_to_gds_real8(v));
            assert!(
                (result - v).abs() < v.abs() * 1e-10 + 1e-15,
                "Roundtrip failed for {}: got {}",
                v,
                result
            );
        }
    }

    #[test]
    fn test_shapes_keep_layer_and_datatype() {
        let mut db = LayoutDatabase::new("test_lib");
        let mut cell = Cell::new("test_cell");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new((1, 0), 0.0, 0.0, 1.0, 0.5)));
        cell.add_geometry(GeomPrimitive::Polygon(Polygon::new(
            (2, 5),
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 2.0),
                Point::new(2.0, 2.0),
                Point::new(2.0, 0.0),
            ],
        )));
        cell.add_geometry(GeomPrimitive::Path(LayoutPath::new(
            (3, 1),
            vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)],
            0.5,
        )));
        db.add_cell(cell);

        let read_db = roundtrip(&db);
        assert_eq!(read_db.name, "test_lib");
        assert!((read_db.user_unit_m - 1e-6).abs() < 1e-15);
        let read_cell = read_db.find_cell_by_name("test_cell").unwrap();
        let layers: Vec<_> = read_cell.geometries.iter().map(|g| g.layer()).collect();
        assert_eq!(layers, vec![(1, 0), (2, 5), (3, 1)]);

        // Boundaries stay polygons with their stored vertex order.
        match &read_cell.geometries[1] {
            GeomPrimitive::Polygon(p) => {
                assert!(close(p.vertices[1], Point::new(0.0, 2.0)));
                assert_eq!(p.vertex_count(), 4);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
        match &read_cell.geometries[2] {
            GeomPrimitive::Path(p) => assert!((p.width - 0.5).abs() < 1e-12),
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn test_references_resolve_by_name() {
        let mut db = LayoutDatabase::new("lib");
        let mut leaf = Cell::new("leaf");
        leaf.add_geometry(GeomPrimitive::Rect(Rect::new((1, 0), 0.0, 0.0, 1.0, 1.0)));
        db.add_cell(leaf);
        let mut top = Cell::new("top");
        let mut t = Transform::translate(5.0, 0.0);
        t.rotation = 90.0;
        top.add_instance(CellInstance::new("leaf", t));
        db.add_cell(top);

        let read_db = roundtrip(&db);
        let top = read_db.find_cell_by_name("top").unwrap();
        assert_eq!(top.instances[0].cell_name, "leaf");
        assert_eq!(top.instances[0].transform.rotation, 90.0);
        let rings = read_db.polygons(top, (1, 0)).unwrap();
        assert_eq!(rings.len(), 1);
        assert!(rings[0].iter().any(|p| close(*p, Point::new(4.0, 1.0))));
    }

    #[test]
    fn test_aref_expands_to_grid() {
        let mut stream = Vec::new();
        stream.extend(raw_record(record_type::HEADER, &600i16.to_be_bytes()));
        stream.extend(raw_record(record_type::BGNLIB, &[0; 24]));
        stream.extend(raw_record(record_type::LIBNAME, b"ar"));
        let units: Vec<u8> = [0.001, 1e-9].iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        stream.extend(raw_record(record_type::UNITS, &units));
        stream.extend(raw_record(record_type::BGNSTR, &[0; 24]));
        stream.extend(raw_record(record_type::STRNAME, b"top\0"));
        stream.extend(raw_record(record_type::AREF, &[]));
        stream.extend(raw_record(record_type::SNAME, b"unit"));
        let colrow: Vec<u8> = [3i16, 2].iter().flat_map(|v| v.to_be_bytes()).collect();
        stream.extend(raw_record(record_type::COLROW, &colrow));
        let xy: Vec<u8> = [0i32, 0, 3000, 0, 0, 4000]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        stream.extend(raw_record(record_type::XY, &xy));
        stream.extend(raw_record(record_type::ENDEL, &[]));
        stream.extend(raw_record(record_type::ENDSTR, &[]));
        stream.extend(raw_record(record_type::ENDLIB, &[]));

        let db = GdsReader::new(Cursor::new(stream)).read().unwrap();
        let top = db.find_cell_by_name("top").unwrap();
        assert_eq!(top.instance_count(), 6);
        let offsets: Vec<_> = top.instances.iter().map(|i| i.transform.offset).collect();
        assert!(close(offsets[1], Point::new(1.0, 0.0)));
        assert!(close(offsets[5], Point::new(2.0, 2.0)));
    }

    #[test]
    fn test_rejects_bad_streams() {
        let empty: Vec<u8> = Vec::new();
        assert!(matches!(
            GdsReader::new(Cursor::new(empty)).read(),
            Err(GdsError::InvalidRecord { .. })
        ));

        let not_gds = raw_record(record_type::BGNLIB, &[0; 24]);
        assert!(matches!(
            GdsReader::new(Cursor::new(not_gds)).read(),
            Err(GdsError::UnexpectedRecord { .. })
        ));

        let mut truncated = raw_record(record_type::HEADER, &600i16.to_be_bytes());
        truncated.extend(raw_record(record_type::BGNSTR, &[0; 24]));
        assert!(matches!(
            GdsReader::new(Cursor::new(truncated)).read(),
            Err(GdsError::Truncated(_))
        ));
    }
}
