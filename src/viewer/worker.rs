//! Background asset loader.
//!
//! Decoding the HDR environment, the glTF model and the material maps runs
//! off the UI thread.
//! The UI sends commands and polls results without blocking once per frame.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::environment::{self, EnvironmentMap};
use super::material::{TextureData, TextureSource};
use super::model::ModelData;

/// Commands sent from UI to worker.
#[derive(Debug)]
pub enum LoadCommand {
    /// Decode and prefilter an equirectangular HDR image.
    Environment(PathBuf),
    /// Parse a glTF/GLB model.
    Model(PathBuf),
    /// Decode material maps. Maps that fail are logged and left out.
    Textures(Vec<TextureSource>),
    /// Stop the worker thread.
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Environment,
    Model,
}

/// Results sent from worker back to UI.
#[derive(Debug)]
pub enum LoadResult {
    EnvironmentReady(EnvironmentMap),
    ModelReady(ModelData),
    TexturesReady(Vec<TextureData>),
    Failed {
        kind: AssetKind,
        path: PathBuf,
        error: String,
    },
}

/// Handle to communicate with the background loader.
pub struct LoaderHandle {
    tx: Sender<LoadCommand>,
    rx: Receiver<LoadResult>,
    handle: Option<JoinHandle<()>>,
}

impl LoaderHandle {
    /// Spawn the loader thread.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = channel::<LoadCommand>();
        let (res_tx, res_rx) = channel::<LoadResult>();

        let handle = thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || loader_loop(cmd_rx, res_tx))
            .map_err(|e| warn!("failed to spawn loader thread: {e}"))
            .ok();

        Self {
            tx: cmd_tx,
            rx: res_rx,
            handle,
        }
    }

    /// Queue a load. Ignored once the worker has stopped.
    pub fn request(&self, cmd: LoadCommand) {
        let _ = self.tx.send(cmd);
    }

    /// Check for ready results (non-blocking).
    pub fn try_recv(&self) -> Option<LoadResult> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next result.
    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<LoadResult> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(&mut self) {
        let _ = self.tx.send(LoadCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main loader loop - runs in background thread.
fn loader_loop(rx: Receiver<LoadCommand>, tx: Sender<LoadResult>) {
    while let Ok(cmd) = rx.recv() {
        let result = match cmd {
            LoadCommand::Environment(path) => match environment::load_hdr(&path) {
                Ok(env) => {
                    info!(path = %path.display(), levels = env.levels.len(), "environment loaded");
                    LoadResult::EnvironmentReady(env)
                }
                Err(e) => LoadResult::Failed {
                    kind: AssetKind::Environment,
                    path,
                    error: e.to_string(),
                },
            },
            LoadCommand::Model(path) => match ModelData::load(&path) {
                Ok(model) => {
                    info!(path = %path.display(), nodes = model.nodes.len(), "model loaded");
                    LoadResult::ModelReady(model)
                }
                Err(e) => LoadResult::Failed {
                    kind: AssetKind::Model,
                    path,
                    error: e.to_string(),
                },
            },
            LoadCommand::Textures(sources) => LoadResult::TexturesReady(decode_textures(&sources)),
            LoadCommand::Stop => break,
        };

        if tx.send(result).is_err() {
            break; // UI disconnected
        }
    }
}

fn decode_textures(sources: &[TextureSource]) -> Vec<TextureData> {
    sources
        .iter()
        .filter_map(|source| match source.decode() {
            Ok(data) => {
                info!(path = %source.path.display(), width = data.width, height = data.height, "texture decoded");
                Some(data)
            }
            Err(e) => {
                warn!("texture {}: {e}", source.path.display());
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::material::ColorSpace;
    use std::time::Duration;

    #[test]
    fn test_missing_files_report_failure() {
        let loader = LoaderHandle::spawn();
        loader.request(LoadCommand::Environment(PathBuf::from("missing/env.hdr")));
        loader.request(LoadCommand::Model(PathBuf::from("missing/model.glb")));

        match loader.recv_timeout(Duration::from_secs(10)) {
            Some(LoadResult::Failed { kind, path, .. }) => {
                assert_eq!(kind, AssetKind::Environment);
                assert_eq!(path, PathBuf::from("missing/env.hdr"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        match loader.recv_timeout(Duration::from_secs(10)) {
            Some(LoadResult::Failed { kind, .. }) => assert_eq!(kind, AssetKind::Model),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_loads_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.glb");
        std::fs::write(&path, super::super::model::tests::test_glb()).unwrap();

        let loader = LoaderHandle::spawn();
        loader.request(LoadCommand::Model(path));
        match loader.recv_timeout(Duration::from_secs(10)) {
            Some(LoadResult::ModelReady(model)) => assert!(model.find("test").is_some()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decodes_textures_skipping_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.png");
        image::RgbaImage::from_pixel(2, 1, image::Rgba([128, 128, 255, 255]))
            .save(&path)
            .unwrap();

        let loader = LoaderHandle::spawn();
        loader.request(LoadCommand::Textures(vec![
            TextureSource::new(dir.path().join("missing.png"), ColorSpace::Srgb),
            TextureSource::new(&path, ColorSpace::Linear),
        ]));
        match loader.recv_timeout(Duration::from_secs(10)) {
            Some(LoadResult::TexturesReady(textures)) => {
                assert_eq!(textures.len(), 1);
                assert_eq!(textures[0].key(), (path.clone(), ColorSpace::Linear));
                assert_eq!((textures[0].width, textures[0].height), (2, 1));
                assert_eq!(&textures[0].rgba[0..4], &[128, 128, 255, 255]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut loader = LoaderHandle::spawn();
        loader.stop();
        loader.stop();
        assert!(loader.try_recv().is_none());
    }
}
