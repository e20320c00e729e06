/// NumPy density-map loading (.npy format)
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use candle_core::{Device, Tensor};
use ndarray::ArrayD;
use ndarray_npy::ReadNpyExt;

use crate::CrowdError;

fn data_error(path: &Path, message: String) -> CrowdError {
    CrowdError::Data {
        path: path.to_path_buf(),
        message,
    }
}

fn open(path: &Path) -> crate::Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| data_error(path, format!("Failed to open: {}", e)))
}

/// Load a density map of any rank as an F32 tensor.
///
/// Python tooling usually saves float64 maps, so f64 files are accepted and
/// cast down.
pub fn load_density_npy<P: AsRef<Path>>(path: P, device: &Device) -> crate::Result<Tensor> {
    let path = path.as_ref();

    let array: ArrayD<f32> = match ArrayD::<f32>::read_npy(open(path)?) {
        Ok(array) => array,
        Err(f32_err) => match ArrayD::<f64>::read_npy(open(path)?) {
            Ok(array) => array.mapv(|x| x as f32),
            Err(_) => return Err(data_error(path, format!("Failed to read npy: {}", f32_err))),
        },
    };

    let shape = array.shape().to_vec();
    let data: Vec<f32> = array.iter().copied().collect();

    log::trace!("Loaded density map {:?} with shape {:?}", path, shape);

    Ok(Tensor::from_vec(data, shape, device)?)
}

/// Loader closure for [`PairedSequenceGenerator`](super::PairedSequenceGenerator)
pub fn npy_loader(device: Device) -> impl Fn(&Path) -> crate::Result<Tensor> {
    move |path: &Path| load_density_npy(path, &device)
}
