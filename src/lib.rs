//! DWI-WASM: per-voxel diffusion MRI model fitting
//!
//! This crate applies per-voxel signal models to 4D diffusion datasets,
//! in parallel, with masking and per-voxel failure isolation, and compiles
//! to WebAssembly for browser-based processing.
//!
//! # Modules
//! - `volume`: Voxel grids, multi-channel volumes, masks
//! - `function`: The per-voxel `VectFunction` contract and combinators
//! - `engine`: Parallel volume evaluation (unary and binary)
//! - `gradients`: b-value/direction tables, shells, subsets
//! - `solvers`: Simplex, linear least squares, Richardson-Lucy
//! - `peaks`: Sphere sampling and ODF peak extraction
//! - `models`: Exponential decay, ODF peaks, spherical deconvolution
//! - `noise`: Gaussian/Rician noise synthesis
//!
//! Volumes cross the JS boundary in planar layout: channel c of voxel
//! (i, j, k) is at `c * nx * ny * nz + i + j * nx + k * nx * ny`.

// Core modules
pub mod error;
pub mod volume;
pub mod function;
pub mod engine;

// Acquisition and numerics
pub mod gradients;
pub mod solvers;
pub mod peaks;

// Models
pub mod models;
pub mod noise;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use crate::engine::{apply_binary_function, apply_function, apply_function_local, EngineConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::volume::{Mask, Sampling, Volume};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

#[allow(unused_macros)]
macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: ConfigError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Planar data plus optional mask (empty slice = no mask) as engine inputs
fn volume_and_mask(
    data: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
) -> ConfigResult<(Volume, Option<Mask>)> {
    let sampling = Sampling::new(nx, ny, nz);
    let n_total = sampling.size();
    if n_total == 0 || data.len() % n_total != 0 {
        return Err(ConfigError::InvalidParameter(format!(
            "data length {} is not a multiple of {}x{}x{}", data.len(), nx, ny, nz
        )));
    }

    let volume = Volume::from_planar(sampling.clone(), data.len() / n_total, data)?;
    let mask = if mask.is_empty() {
        None
    } else {
        Some(Mask::new(sampling, mask.to_vec())?)
    };
    Ok((volume, mask))
}

fn exp_decay_fit(xs: &[f64], method: &str) -> ConfigResult<models::ExpDecayFit> {
    let params = models::ExpDecayParams {
        method: method.parse()?,
        ..Default::default()
    };
    models::ExpDecayFit::new(xs.to_vec(), params)
}

#[allow(clippy::too_many_arguments)]
fn spherical_deconv(
    bvals: &[f64],
    bvecs: &[f64],
    subdivisions: usize,
    lambda_par: f64,
    lambda_perp: f64,
    iterations: usize,
    damping: f64,
) -> ConfigResult<models::SphericalDeconv> {
    if bvecs.len() != 3 * bvals.len() {
        return Err(ConfigError::DimensionMismatch {
            what: "interleaved gradient directions",
            expected: 3 * bvals.len(),
            actual: bvecs.len(),
        });
    }
    let bvecs = bvecs.chunks_exact(3).map(|v| [v[0], v[1], v[2]]).collect();
    let gradients = gradients::Gradients::new(bvals.to_vec(), bvecs)?;
    let sphere = peaks::SphereSampling::checked_icosphere(subdivisions)?;
    let params = models::SphericalDeconvParams {
        lambda_par,
        lambda_perp,
        rl: solvers::RichardsonLucyParams { iterations, damping },
    };
    models::SphericalDeconv::new(&gradients, &sphere, params)
}

/// Forward engine progress to a JS `(current, total)` callback
fn js_progress(progress_callback: &js_sys::Function) -> impl FnMut(usize, usize) {
    let callback = progress_callback.clone();
    move |current, total| {
        let this = JsValue::null();
        let _ = callback.call2(&this,
            &JsValue::from(current as u32),
            &JsValue::from(total as u32));
    }
}

// ============================================================================
// WASM Exports: Exponential Decay
// ============================================================================

/// Fit s(x) = alpha * exp(-beta * x) in every voxel
///
/// # Arguments
/// * `signal` - Planar signal (n_x * nx * ny * nz), one channel per acquisition value
/// * `mask` - Uint8Array mask (nx * ny * nz), 0 = skip; empty for no mask
/// * `nx`, `ny`, `nz` - Array dimensions
/// * `xs` - Acquisition values (b-values or echo times)
/// * `method` - "lls", "wlls" or "nlls"
///
/// # Returns
/// Planar [alpha, beta] maps (2 * nx * ny * nz); failed voxels are zero
#[wasm_bindgen]
pub fn fit_exp_decay_wasm(
    signal: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    xs: &[f64],
    method: &str,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM fit_exp_decay: {}x{}x{}, {} samples, method={}", nx, ny, nz, xs.len(), method);

    let (volume, mask) = volume_and_mask(signal, mask, nx, ny, nz).map_err(js_err)?;
    let fit = exp_decay_fit(xs, method).map_err(js_err)?;
    let factory = || Ok::<_, ConfigError>(fit.clone());
    let output = apply_function(&volume, mask.as_ref(), &factory, &EngineConfig::default())
        .map_err(js_err)?;

    console_log!("WASM fit_exp_decay complete: {} voxels, {} failed", output.processed, output.failed);
    Ok(output.volume().to_planar())
}

/// Exponential decay fit with progress callback
#[wasm_bindgen]
pub fn fit_exp_decay_wasm_with_progress(
    signal: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    xs: &[f64],
    method: &str,
    progress_callback: &js_sys::Function,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM fit_exp_decay with progress: {}x{}x{}, method={}", nx, ny, nz, method);

    let (volume, mask) = volume_and_mask(signal, mask, nx, ny, nz).map_err(js_err)?;
    let fit = exp_decay_fit(xs, method).map_err(js_err)?;
    let factory = || Ok::<_, ConfigError>(fit.clone());
    let output = apply_function_local(&volume, mask.as_ref(), &factory, js_progress(progress_callback))
        .map_err(js_err)?;

    console_log!("WASM fit_exp_decay complete: {} voxels, {} failed", output.processed, output.failed);
    Ok(output.volume().to_planar())
}

/// RMSE between measured signals and fitted [alpha, beta] maps
///
/// # Returns
/// RMSE map (nx * ny * nz)
#[wasm_bindgen]
pub fn exp_decay_residual_wasm(
    signal: &[f64],
    fitted: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    xs: &[f64],
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM exp_decay_residual: {}x{}x{}", nx, ny, nz);

    let (signal, mask) = volume_and_mask(signal, mask, nx, ny, nz).map_err(js_err)?;
    let (fitted, _) = volume_and_mask(fitted, &[], nx, ny, nz).map_err(js_err)?;
    let residual = models::ExpDecayResidual::new(xs.to_vec());
    let factory = || Ok::<_, ConfigError>(residual.clone());
    let output = apply_binary_function(&signal, &fitted, mask.as_ref(), &factory, &EngineConfig::default())
        .map_err(js_err)?;

    console_log!("WASM exp_decay_residual complete");
    Ok(output.into_volume().into_data())
}

// ============================================================================
// WASM Exports: Orientation Distributions
// ============================================================================

/// Spherical Richardson-Lucy deconvolution
///
/// # Arguments
/// * `signal` - Planar DWI signal (n_grad * nx * ny * nz)
/// * `mask` - Uint8Array mask (nx * ny * nz); empty for no mask
/// * `nx`, `ny`, `nz` - Array dimensions
/// * `bvals` - b-values (n_grad)
/// * `bvecs` - Gradient directions, xyz interleaved (3 * n_grad)
/// * `subdivisions` - Icosphere level of the ODF sampling
/// * `lambda_par`, `lambda_perp` - Single-fiber response diffusivities
/// * `iterations`, `damping` - Richardson-Lucy settings
///
/// # Returns
/// Planar ODF volume (n_dirs * nx * ny * nz)
#[wasm_bindgen]
pub fn rl_deconv_wasm(
    signal: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    bvals: &[f64],
    bvecs: &[f64],
    subdivisions: usize,
    lambda_par: f64,
    lambda_perp: f64,
    iterations: usize,
    damping: f64,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM rl_deconv: {}x{}x{}, {} gradients, level {}",
                 nx, ny, nz, bvals.len(), subdivisions);

    let (volume, mask) = volume_and_mask(signal, mask, nx, ny, nz).map_err(js_err)?;
    let deconv = spherical_deconv(bvals, bvecs, subdivisions, lambda_par, lambda_perp, iterations, damping)
        .map_err(js_err)?;
    let factory = || Ok::<_, ConfigError>(deconv.clone());
    let output = apply_function(&volume, mask.as_ref(), &factory, &EngineConfig::default())
        .map_err(js_err)?;

    console_log!("WASM rl_deconv complete: {} voxels, {} failed", output.processed, output.failed);
    Ok(output.volume().to_planar())
}

/// Richardson-Lucy deconvolution with progress callback
#[wasm_bindgen]
pub fn rl_deconv_wasm_with_progress(
    signal: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    bvals: &[f64],
    bvecs: &[f64],
    subdivisions: usize,
    lambda_par: f64,
    lambda_perp: f64,
    iterations: usize,
    damping: f64,
    progress_callback: &js_sys::Function,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM rl_deconv with progress: {}x{}x{}, {} gradients, level {}",
                 nx, ny, nz, bvals.len(), subdivisions);

    let (volume, mask) = volume_and_mask(signal, mask, nx, ny, nz).map_err(js_err)?;
    let deconv = spherical_deconv(bvals, bvecs, subdivisions, lambda_par, lambda_perp, iterations, damping)
        .map_err(js_err)?;
    let factory = || Ok::<_, ConfigError>(deconv.clone());
    let output = apply_function_local(&volume, mask.as_ref(), &factory, js_progress(progress_callback))
        .map_err(js_err)?;

    console_log!("WASM rl_deconv complete: {} voxels, {} failed", output.processed, output.failed);
    Ok(output.volume().to_planar())
}

/// Extract fiber peaks from ODFs sampled on an icosphere
///
/// # Arguments
/// * `odf` - Planar ODF volume (n_dirs * nx * ny * nz)
/// * `subdivisions` - Icosphere level the ODF was sampled on
/// * `comps`, `thresh`, `cluster` - Max peaks, minimum value, separation (degrees)
/// * `mode` - "peak" (value at maximum) or "lobe" (mean over lobe)
///
/// # Returns
/// Planar fibers (4 * comps * nx * ny * nz), per fiber [weight, x, y, z]
#[wasm_bindgen]
pub fn odf_peaks_wasm(
    odf: &[f64],
    mask: &[u8],
    nx: usize, ny: usize, nz: usize,
    subdivisions: usize,
    comps: usize,
    thresh: f64,
    cluster: f64,
    mode: &str,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM odf_peaks: {}x{}x{}, comps={}, thresh={:.3}, cluster={:.1}",
                 nx, ny, nz, comps, thresh, cluster);

    let (volume, mask) = volume_and_mask(odf, mask, nx, ny, nz).map_err(js_err)?;
    let sphere = Arc::new(peaks::SphereSampling::checked_icosphere(subdivisions).map_err(js_err)?);
    let params = peaks::PeakParams {
        comps,
        thresh,
        cluster,
        mode: mode.parse().map_err(js_err)?,
        ..Default::default()
    };
    let factory = || models::OdfPeaks::new(sphere.clone(), params.clone());
    let output = apply_function(&volume, mask.as_ref(), &factory, &EngineConfig::default())
        .map_err(js_err)?;

    console_log!("WASM odf_peaks complete");
    Ok(output.volume().to_planar())
}

fn sphere_directions(subdivisions: usize) -> ConfigResult<Vec<f64>> {
    let sphere = peaks::SphereSampling::checked_icosphere(subdivisions)?;
    Ok(sphere.dirs().iter().flat_map(|d| d.iter().copied()).collect())
}

/// Sphere directions of an icosphere level, xyz interleaved
#[wasm_bindgen]
pub fn get_sphere_directions(subdivisions: usize) -> Result<Vec<f64>, JsValue> {
    sphere_directions(subdivisions).map_err(js_err)
}

// ============================================================================
// WASM Exports: Simulation
// ============================================================================

/// Add Gaussian or Rician noise with a reproducible seed
#[wasm_bindgen]
pub fn add_noise_wasm(data: &[f64], sigma: f64, noise_type: &str, seed: u64) -> Result<Vec<f64>, JsValue> {
    let noise_type: noise::NoiseType = noise_type.parse().map_err(js_err)?;
    let mut out = data.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    noise::add_noise_vect(&mut out, sigma, noise_type, &mut rng).map_err(js_err)?;
    Ok(out)
}

/// Get version string
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// ============================================================================
// Tests
// ============================================================================
