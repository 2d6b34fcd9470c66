use super::context::WorkerContext;
use super::error::{BridgeError, ProtocolFault};
use super::materialize::{MaterializeOptions, MaterializerRegistry, ResultPayload, ReturnType};
use super::module::ModuleKind;
use super::shims;
use super::staging::{PayloadKind, ScratchPath, StagedFile};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, instrument};

/// One engine command as the host phrased it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// An engine operation name or a registered shim name.
    pub command: String,
    pub args: Vec<Value>,
    pub return_type: ReturnType,
    pub chain_id: Option<String>,
    pub module: ModuleKind,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, args: Vec<Value>, return_type: ReturnType) -> Self {
        Self {
            command: command.into(),
            args,
            return_type,
            chain_id: None,
            module: ModuleKind::default(),
        }
    }

    pub fn with_chain(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn on_module(mut self, module: ModuleKind) -> Self {
        self.module = module;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub payload: ResultPayload,
    pub engine_ms: f64,
    pub conversion_ms: f64,
}

/// Coordinate text formats the worker can export a model in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFormat {
    Pdb,
    MmCif,
}

impl CoordinateFormat {
    pub fn parse(format: &str) -> Result<Self, ProtocolFault> {
        match format {
            "pdb" => Ok(CoordinateFormat::Pdb),
            "mmcif" => Ok(CoordinateFormat::MmCif),
            other => Err(ProtocolFault::invalid_argument(
                "format",
                format!("expected 'pdb' or 'mmcif', got '{}'", other),
            )),
        }
    }

    fn writer(self) -> &'static str {
        match self {
            CoordinateFormat::Pdb => "writePDBASCII",
            CoordinateFormat::MmCif => "writeCIFASCII",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            CoordinateFormat::Pdb => ".pdb",
            CoordinateFormat::MmCif => ".cif",
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Resolves commands to shim or direct engine calls and materializes their results.
///
/// The router holds no engine state of its own; every call borrows the worker context
/// mutably, so two engine calls can never overlap.
pub struct CommandRouter {
    materializers: MaterializerRegistry,
}

impl CommandRouter {
    /// Builds a router over the standard materializers, validating both registries.
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_materializers(MaterializerRegistry::standard())
    }

    pub fn with_materializers(materializers: MaterializerRegistry) -> Result<Self, BridgeError> {
        materializers.validate()?;
        shims::validate()?;
        Ok(Self { materializers })
    }

    #[instrument(skip_all, fields(command = %request.command, module = %request.module))]
    pub fn execute(
        &self,
        ctx: &mut WorkerContext,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, BridgeError> {
        let (engine, config) = ctx.engine_and_config(request.module)?;
        let options = MaterializeOptions {
            chain_id: request.chain_id.clone(),
            bond_length_ceiling: config.bond_length_ceiling,
        };

        let started = Instant::now();
        let result = match shims::lookup(&request.command) {
            Some(shim) => shim.run(engine, config, &request.args)?,
            None => engine.call(&request.command, &request.args)?,
        };
        let engine_ms = elapsed_ms(started);

        let started = Instant::now();
        let payload = self
            .materializers
            .materialize(request.return_type, result, &options)?;
        let conversion_ms = elapsed_ms(started);

        debug!(
            return_type = %request.return_type,
            engine_ms,
            conversion_ms,
            "Command completed"
        );
        Ok(CommandOutcome {
            payload,
            engine_ms,
            conversion_ms,
        })
    }

    /// Exports a model as coordinate text.
    pub fn fetch_atoms(
        &self,
        ctx: &mut WorkerContext,
        mol_no: i64,
        format: CoordinateFormat,
    ) -> Result<String, BridgeError> {
        let (engine, config) = ctx.engine_and_config(ModuleKind::Coot)?;
        let scratch = ScratchPath::reserve(engine.fs(), &config.staging_dir, format.extension());
        engine
            .call(format.writer(), &[json!(mol_no), json!(scratch.path())])?
            .release();
        let bytes = scratch.read()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Exports a map molecule in CCP4 format.
    pub fn fetch_map(&self, ctx: &mut WorkerContext, mol_no: i64) -> Result<Vec<u8>, BridgeError> {
        let (engine, config) = ctx.engine_and_config(ModuleKind::Coot)?;
        let scratch = ScratchPath::reserve(engine.fs(), &config.staging_dir, ".map");
        engine
            .call("writeCCP4Map", &[json!(mol_no), json!(scratch.path())])?
            .release();
        scratch.read()
    }

    /// Reads back a file previously left in the engine filesystem.
    pub fn fetch_file(
        &self,
        ctx: &mut WorkerContext,
        file_name: &str,
    ) -> Result<Vec<u8>, BridgeError> {
        let engine = ctx.engine_mut(ModuleKind::Coot)?;
        engine
            .fs()
            .read_file(file_name)
            .map_err(|source| BridgeError::staging(file_name, source))
    }

    pub fn delete_file(&self, ctx: &mut WorkerContext, file_name: &str) -> Result<(), BridgeError> {
        let engine = ctx.engine_mut(ModuleKind::Coot)?;
        engine
            .fs()
            .unlink(file_name)
            .map_err(|source| BridgeError::staging(file_name, source))
    }

    /// Loads reflection data as a map using the default map coefficient columns.
    pub fn read_mtz(
        &self,
        ctx: &mut WorkerContext,
        bytes: &[u8],
        name: &str,
    ) -> Result<i64, BridgeError> {
        let (engine, config) = ctx.engine_and_config(ModuleKind::Coot)?;
        let staged = StagedFile::with_generated_name(
            engine.fs(),
            &config.staging_dir,
            PayloadKind::Reflections.staged_extension(Some(name)),
            bytes,
        )?;
        let imol = engine.call(
            "read_mtz",
            &[
                json!(staged.path()),
                json!("FWT"),
                json!("PHWT"),
                json!(""),
                json!(false),
                json!(false),
            ],
        )?;
        Ok(imol.as_int()?)
    }

    /// Computes Ramachandran data for one chain of a model.
    pub fn ramachandran(
        &self,
        ctx: &mut WorkerContext,
        mol_no: i64,
        chain_id: &str,
    ) -> Result<ResultPayload, BridgeError> {
        let (engine, config) = ctx.engine_and_config(ModuleKind::Coot)?;
        let scratch = ScratchPath::reserve(engine.fs(), &config.staging_dir, ".pdb");
        engine
            .call("writePDBASCII", &[json!(mol_no), json!(scratch.path())])?
            .release();
        let result = engine.call(
            "getRamachandranData",
            &[json!(scratch.path()), json!(chain_id)],
        )?;
        let options = MaterializeOptions {
            chain_id: Some(chain_id.to_string()),
            bond_length_ceiling: config.bond_length_ceiling,
        };
        self.materializers
            .materialize(ReturnType::RamachandranData, result, &options)
    }

    pub fn copy_fragment(
        &self,
        ctx: &mut WorkerContext,
        mol_no: i64,
        chain_id: &str,
        res_no_start: i64,
        res_no_end: i64,
    ) -> Result<i64, BridgeError> {
        let engine = ctx.engine_mut(ModuleKind::Coot)?;
        let imol = engine.call(
            "copy_fragment_using_residue_range",
            &[
                json!(mol_no),
                json!(chain_id),
                json!(res_no_start),
                json!(res_no_end),
            ],
        )?;
        Ok(imol.as_int()?)
    }

    pub fn close_molecule(
        &self,
        ctx: &mut WorkerContext,
        mol_no: i64,
    ) -> Result<Value, BridgeError> {
        let engine = ctx.engine_mut(ModuleKind::Coot)?;
        let status = engine.call("close_molecule", &[json!(mol_no)])?;
        Ok(status.to_plain_value()?)
    }
}
