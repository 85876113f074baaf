//! Recurrent network descriptors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::DnnContext;
use super::dropout::DropoutDescriptor;
use super::ffi::{DataType, RawRnnDescriptor, RnnAlgorithm, RnnDirection, RnnInputMode, RnnMode};
use super::handle::{OwnedDescriptor, RnnKind};
use super::library::RnnSettings;
use crate::error::{check, DnnError, DnnResult};
use crate::tensor::Precision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnConfig {
    pub hidden_size: usize,
    /// Unrolled length; carried for the caller's tensor descriptors, not set on the handle.
    pub seq_length: usize,
    pub num_layers: usize,
    pub input_mode: RnnInputMode,
    pub direction: RnnDirection,
    pub mode: RnnMode,
    pub algorithm: RnnAlgorithm,
    pub data_type: DataType,
    /// Probability applied between layers.
    pub dropout: f32,
    pub seed: u64,
}

impl RnnConfig {
    pub fn new(hidden_size: usize, seq_length: usize, num_layers: usize, mode: RnnMode, data_type: DataType) -> Self {
        Self {
            hidden_size,
            seq_length,
            num_layers,
            input_mode: RnnInputMode::Linear,
            direction: RnnDirection::Unidirectional,
            mode,
            algorithm: RnnAlgorithm::Standard,
            data_type,
            dropout: 0.0,
            seed: 0,
        }
    }

    /// Build a config from raw library enum tags.
    #[allow(clippy::too_many_arguments)]
    pub fn from_tags(
        hidden_size: usize,
        seq_length: usize,
        num_layers: usize,
        input_mode: i32,
        direction: i32,
        mode: i32,
        data_type: i32,
    ) -> DnnResult<Self> {
        let mut config = Self::new(
            hidden_size,
            seq_length,
            num_layers,
            RnnMode::try_from(mode)?,
            DataType::try_from(data_type)?,
        );
        config.input_mode = RnnInputMode::try_from(input_mode)?;
        config.direction = RnnDirection::try_from(direction)?;
        Ok(config)
    }

    pub fn with_input_mode(mut self, input_mode: RnnInputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    pub fn with_direction(mut self, direction: RnnDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_algorithm(mut self, algorithm: RnnAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_dropout(mut self, dropout: f32, seed: u64) -> Self {
        self.dropout = dropout;
        self.seed = seed;
        self
    }

    fn settings(&self, dropout: &DropoutDescriptor) -> DnnResult<RnnSettings> {
        let to_i32 = |value: usize, what: &str| {
            i32::try_from(value)
                .ok()
                .filter(|&v| v > 0)
                .ok_or_else(|| DnnError::Configuration(format!("{} {} must be in 1..=i32::MAX", what, value)))
        };

        Ok(RnnSettings {
            hidden_size: to_i32(self.hidden_size, "hidden size")?,
            num_layers: to_i32(self.num_layers, "layer count")?,
            dropout: dropout.descriptor(),
            input_mode: self.input_mode,
            direction: self.direction,
            mode: self.mode,
            algorithm: self.algorithm,
            data_type: self.data_type,
        })
    }

    fn validate(&self) -> DnnResult<()> {
        if self.hidden_size == 0 || self.num_layers == 0 || self.seq_length == 0 {
            return Err(DnnError::Configuration(format!(
                "hidden size {}, sequence length {} and layer count {} must be non-zero",
                self.hidden_size, self.seq_length, self.num_layers
            )));
        }
        let precision = Precision::from_data_type(self.data_type);
        if !precision.is_float() {
            return Err(DnnError::UnsupportedPrecision(precision));
        }
        Ok(())
    }
}

/// Owns an RNN descriptor together with the dropout descriptor it was set with.
///
/// Not `Clone`:
///
/// ```compile_fail
/// use anvil_dnn::dnn::RnnDescriptor;
///
/// fn duplicate(rnn: &RnnDescriptor) -> RnnDescriptor {
///     rnn.clone()
/// }
/// ```
pub struct RnnDescriptor {
    // Dropped before `dropout`, which it references.
    handle: OwnedDescriptor<RnnKind>,
    dropout: DropoutDescriptor,
    config: RnnConfig,
}

impl RnnDescriptor {
    pub fn new(context: &Arc<DnnContext>, config: RnnConfig) -> DnnResult<Self> {
        config.validate()?;

        let dropout = DropoutDescriptor::new(context, config.dropout, config.seed)?;
        let settings = config.settings(&dropout)?;

        let handle = OwnedDescriptor::<RnnKind>::create(context)?;
        context.with_handle(|library, native| {
            check(
                library.set_rnn_descriptor(native, handle.raw(), &settings),
                "cudnnSetRNNDescriptor_v6",
            )
        })?;
        tracing::debug!(
            "{:?} rnn: {} layers of {} units, {:?}",
            config.mode,
            config.num_layers,
            config.hidden_size,
            config.direction
        );

        Ok(Self {
            handle,
            dropout,
            config,
        })
    }

    pub fn descriptor(&self) -> RawRnnDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawRnnDescriptor {
        self.handle.raw_mut()
    }

    pub fn dropout(&self) -> &DropoutDescriptor {
        &self.dropout
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn seq_length(&self) -> usize {
        self.config.seq_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::ffi::Status;
    use crate::dnn::mock::{MockCall, MockLibrary, ResourceKind};
    use crate::memory::{DeviceAllocator, HostAllocator};

    fn setup() -> (Arc<MockLibrary>, Arc<HostAllocator>, Arc<DnnContext>) {
        let library = Arc::new(MockLibrary::new());
        let allocator = Arc::new(HostAllocator::new());
        let context = DnnContext::new(library.clone(), allocator.clone()).unwrap();
        (library, allocator, context)
    }

    #[test]
    fn test_rnn_descriptor() {
        let (library, _allocator, context) = setup();
        let config = RnnConfig::new(256, 50, 2, RnnMode::Lstm, DataType::Float)
            .with_direction(RnnDirection::Bidirectional)
            .with_dropout(0.1, 1234);

        let rnn = RnnDescriptor::new(&context, config).unwrap();
        let described = library.rnn(rnn.descriptor()).unwrap();
        assert_eq!(described.hidden_size, 256);
        assert_eq!(described.num_layers, 2);
        assert_eq!(described.mode, RnnMode::Lstm);
        assert_eq!(described.direction, RnnDirection::Bidirectional);
        assert_eq!(described.dropout, rnn.dropout().descriptor() as usize);
        assert_eq!(rnn.seq_length(), 50);

        let dropout = library.dropout(rnn.dropout().descriptor()).unwrap();
        assert_eq!(dropout.dropout, 0.1);
        assert_eq!(dropout.seed, 1234);
    }

    #[test]
    fn test_from_tags() {
        let config = RnnConfig::from_tags(128, 10, 1, 1, 0, 3, 2).unwrap();
        assert_eq!(config.input_mode, RnnInputMode::Skip);
        assert_eq!(config.direction, RnnDirection::Unidirectional);
        assert_eq!(config.mode, RnnMode::Gru);
        assert_eq!(config.data_type, DataType::Half);
        assert_eq!(config.dropout, 0.0);

        assert!(matches!(
            RnnConfig::from_tags(128, 10, 1, 0, 0, 9, 0),
            Err(DnnError::Configuration(_))
        ));
        assert!(RnnConfig::from_tags(128, 10, 1, 0, 2, 0, 0).is_err());
    }

    #[test]
    fn test_invalid_configs() {
        let (library, _allocator, context) = setup();

        let empty = RnnConfig::new(0, 10, 1, RnnMode::Tanh, DataType::Float);
        assert!(matches!(RnnDescriptor::new(&context, empty).err(), Some(DnnError::Configuration(_))));

        let integer = RnnConfig::new(16, 10, 1, RnnMode::Tanh, DataType::Int8);
        assert_eq!(
            RnnDescriptor::new(&context, integer).err(),
            Some(DnnError::UnsupportedPrecision(Precision::Int8))
        );

        assert_eq!(library.created(ResourceKind::Rnn), 0);
        assert_eq!(library.created(ResourceKind::Dropout), 0);
    }

    #[test]
    fn test_set_failure_releases_dropout() {
        let (library, allocator, context) = setup();
        library.fail_next(MockCall::SetRnn, Status::BadParam);

        let err = RnnDescriptor::new(&context, RnnConfig::new(32, 4, 1, RnnMode::Relu, DataType::Double))
            .err()
            .unwrap();
        assert_eq!(err, DnnError::library("cudnnSetRNNDescriptor_v6", Status::BadParam));
        assert_eq!(library.live(ResourceKind::Rnn), 0);
        assert_eq!(library.live(ResourceKind::Dropout), 0);
        assert_eq!(allocator.bytes_in_use(), 0);
    }

    #[test]
    fn test_move_destroys_once() {
        let (library, allocator, context) = setup();
        let rnn = RnnDescriptor::new(&context, RnnConfig::new(8, 4, 1, RnnMode::Gru, DataType::Float)).unwrap();

        let mut holder = Vec::new();
        holder.push(rnn);
        let rnn = holder.pop().unwrap();
        assert_eq!(library.live(ResourceKind::Rnn), 1);

        drop(rnn);
        assert_eq!(library.destroyed(ResourceKind::Rnn), 1);
        assert_eq!(library.destroyed(ResourceKind::Dropout), 1);
        assert_eq!(library.invalid_destroys(), 0);
        assert_eq!(allocator.bytes_in_use(), 0);
    }
}
