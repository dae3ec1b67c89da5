use crate::classifier::{Classifier, ModelError, ModelLoader};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

pub struct OrtClassifier {
    sessions: Vec<Mutex<Session>>,
    output_name: String,
    counter: AtomicUsize,
}

impl OrtClassifier {
    pub fn new(model_path: &Path, num_instances: usize) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }

        let sessions = (0..num_instances.max(1))
            .map(|_| {
                Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_path)
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let output_name = sessions
            .first()
            .and_then(|session| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or(ModelError::EmptyOutput)?;

        tracing::info!(
            "Created {} ONNX sessions from {}",
            sessions.len(),
            model_path.display()
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            output_name,
            counter: AtomicUsize::new(0),
        })
    }
}

impl Classifier for OrtClassifier {
    fn classify(&self, input: &Array<f32, Ix4>) -> Result<f32, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index].lock();

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("failed to extract tensor: {}", e)))?;

        let score = data.first().copied();
        score.ok_or(ModelError::EmptyOutput)
    }
}

#[derive(Debug, Clone)]
pub struct OrtModelLoader {
    num_instances: usize,
}

impl OrtModelLoader {
    pub fn new(num_instances: usize) -> Self {
        Self { num_instances }
    }
}

impl ModelLoader for OrtModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
        let classifier = OrtClassifier::new(path, self.num_instances)?;
        Ok(Arc::new(classifier))
    }
}
