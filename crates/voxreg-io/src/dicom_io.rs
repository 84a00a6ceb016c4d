//! DICOM series loading.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::PixelDecoder;
use nalgebra::{Matrix3, Point3 as NaPoint3, Vector3 as NaVector3};
use rayon::prelude::*;
use tracing::debug;
use voxreg_core::image::Image;
use voxreg_core::spatial::{Direction, Point, Spacing};

use crate::error::{IoError, Result};

/// One discovered series, keyed by SeriesInstanceUID.
#[derive(Debug, Clone)]
pub struct DicomSeriesInfo {
    pub series_instance_uid: String,
    pub series_description: String,
    pub modality: String,
    pub file_paths: Vec<PathBuf>,
}

/// Scan a directory for DICOM files, grouping them into series.
///
/// Headers are parsed in parallel; non-DICOM files are skipped silently.
pub fn scan_dicom_directory<P: AsRef<Path>>(path: P) -> Result<Vec<DicomSeriesInfo>> {
    let path = path.as_ref();
    let entries: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let series_map = Arc::new(Mutex::new(HashMap::<String, DicomSeriesInfo>::new()));

    entries.par_iter().for_each(|file_path| {
        if let Ok(obj) = open_file(file_path) {
            let Some(uid) = get_string(&obj, tags::SERIES_INSTANCE_UID) else {
                return;
            };
            let description = get_string(&obj, tags::SERIES_DESCRIPTION).unwrap_or_default();
            let modality = get_string(&obj, tags::MODALITY).unwrap_or_default();

            let mut map = series_map.lock().unwrap();
            let entry = map.entry(uid.clone()).or_insert_with(|| DicomSeriesInfo {
                series_instance_uid: uid,
                series_description: description,
                modality,
                file_paths: Vec::new(),
            });
            entry.file_paths.push(file_path.clone());
        }
    });

    let map = Arc::try_unwrap(series_map).unwrap().into_inner().unwrap();
    let mut series_list: Vec<DicomSeriesInfo> = map.into_values().collect();
    for series in &mut series_list {
        series.file_paths.sort();
    }

    debug!(count = series_list.len(), "scanned DICOM directory");
    Ok(series_list)
}

/// Load a series into a 3D volume.
///
/// Slices are sorted spatially by projecting ImagePositionPatient onto the
/// slice normal; inter-slice spacing comes from those projections and must
/// be uniform within 1%.
pub fn load_dicom_series<B: Backend>(
    series: &DicomSeriesInfo,
    device: &B::Device,
) -> Result<Image<B, 3>> {
    let label = Path::new(&series.series_instance_uid);
    if series.file_paths.is_empty() {
        return Err(IoError::parse(label, "series has no files"));
    }

    let mut slices: Vec<(PathBuf, FileDicomObject<InMemDicomObject>)> = series
        .file_paths
        .par_iter()
        .map(|p| {
            let obj = open_file(p).map_err(|e| IoError::parse(p, e.to_string()))?;
            Ok((p.clone(), obj))
        })
        .collect::<Result<Vec<_>>>()?;

    let first = &slices[0].1;
    let orientation = get_f64_vec(first, tags::IMAGE_ORIENTATION_PATIENT)
        .ok_or_else(|| IoError::parse(label, "missing ImageOrientationPatient"))?;
    if orientation.len() != 6 {
        return Err(IoError::parse(
            label,
            format!("bad ImageOrientationPatient length {}", orientation.len()),
        ));
    }

    let dir_x = NaVector3::new(orientation[0], orientation[1], orientation[2]).normalize();
    let dir_y = NaVector3::new(orientation[3], orientation[4], orientation[5]).normalize();
    let dir_z = dir_x.cross(&dir_y).normalize();

    slices.sort_by(|a, b| {
        let pa = get_position(&a.1).unwrap_or(NaPoint3::origin());
        let pb = get_position(&b.1).unwrap_or(NaPoint3::origin());
        let da = pa.coords.dot(&dir_z);
        let db = pb.coords.dot(&dir_z);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    let first = &slices[0].1;
    let rows = get_u32(first, tags::ROWS).ok_or_else(|| IoError::parse(label, "missing Rows"))?;
    let cols =
        get_u32(first, tags::COLUMNS).ok_or_else(|| IoError::parse(label, "missing Columns"))?;
    let pixel_spacing = get_f64_vec(first, tags::PIXEL_SPACING)
        .ok_or_else(|| IoError::parse(label, "missing PixelSpacing"))?;
    let dy = pixel_spacing[0];
    let dx = pixel_spacing[1];

    let origin_pos = get_position(first)
        .ok_or_else(|| IoError::parse(label, "missing ImagePositionPatient"))?;

    let dz = if slices.len() > 1 {
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for i in 0..slices.len() - 1 {
            let p1 = get_position(&slices[i].1).unwrap_or(NaPoint3::origin());
            let p2 = get_position(&slices[i + 1].1).unwrap_or(NaPoint3::origin());
            let step = (p2 - p1).dot(&dir_z).abs();
            sum += step;
            min = min.min(step);
            max = max.max(step);

            let orient = get_f64_vec(&slices[i + 1].1, tags::IMAGE_ORIENTATION_PATIENT)
                .unwrap_or_default();
            if orient.len() == 6 {
                let cx = NaVector3::new(orient[0], orient[1], orient[2]);
                let cy = NaVector3::new(orient[3], orient[4], orient[5]);
                if (cx - dir_x).norm() > 1e-3 || (cy - dir_y).norm() > 1e-3 {
                    return Err(IoError::parse(label, "inconsistent slice orientation"));
                }
            }
        }
        let avg = sum / (slices.len() - 1) as f64;
        if (max - min) > 0.01 * avg {
            return Err(IoError::parse(
                label,
                format!("non-uniform slice spacing: min={min}, max={max}"),
            ));
        }
        avg
    } else {
        get_f64(first, tags::SLICE_THICKNESS).unwrap_or(1.0)
    };

    let spacing = Spacing::new([dx, dy, dz]);
    let origin = Point::new([origin_pos.x, origin_pos.y, origin_pos.z]);
    let direction = Direction(Matrix3::from_columns(&[dir_x, dir_y, dir_z]));

    // Decode pixel data in parallel, applying the rescale transform.
    let slice_pixels: Vec<Vec<f32>> = slices
        .par_iter()
        .map(|(p, obj)| {
            let pixel_data = obj
                .decode_pixel_data()
                .map_err(|e| IoError::parse(p, e.to_string()))?;
            let slope = get_f64(obj, tags::RESCALE_SLOPE).unwrap_or(1.0) as f32;
            let intercept = get_f64(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32;

            let values = pixel_data
                .to_vec::<f32>()
                .map_err(|e| IoError::parse(p, e.to_string()))?;
            let rescaled: Vec<f32> = values.into_iter().map(|v| v * slope + intercept).collect();

            let expected = rows as usize * cols as usize;
            if rescaled.len() != expected {
                return Err(IoError::parse(
                    p,
                    format!("slice size mismatch: expected {expected}, got {}", rescaled.len()),
                ));
            }
            Ok(rescaled)
        })
        .collect::<Result<Vec<_>>>()?;

    let depth = slices.len();
    let mut flattened = Vec::with_capacity(depth * rows as usize * cols as usize);
    for slice in slice_pixels {
        flattened.extend(slice);
    }

    let shape = Shape::new([depth, rows as usize, cols as usize]);
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(flattened, shape), device);

    Ok(Image::new(tensor, origin, spacing, direction))
}

/// Read the single series contained in a directory.
pub fn read_dicom_series<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let series_list = scan_dicom_directory(path)?;
    match series_list.len() {
        0 => Err(IoError::parse(path, "no DICOM series found")),
        1 => load_dicom_series(&series_list[0], device),
        n => Err(IoError::parse(
            path,
            format!("{n} DICOM series found, select one with scan_dicom_directory"),
        )),
    }
}

fn get_string(obj: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<String> {
    obj.element(tag).ok()?.to_str().ok().map(|s| s.to_string())
}

fn get_u32(obj: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<u32> {
    obj.element(tag).ok()?.to_int::<u32>().ok()
}

fn get_f64(obj: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

fn get_f64_vec(obj: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok()?.to_multi_float64().ok()
}

fn get_position(obj: &FileDicomObject<InMemDicomObject>) -> Option<NaPoint3<f64>> {
    let v = get_f64_vec(obj, tags::IMAGE_POSITION_PATIENT)?;
    (v.len() == 3).then(|| NaPoint3::new(v[0], v[1], v[2]))
}
