//! The block-device backend.

use std::path::Path;

use storctl_binding::{Binding, EnvOptions, EnvSession};
use storctl_errors::Fault;
use tracing::{debug, error, info};

use crate::config::BackendConfig;
use crate::error::{BdevError, BdevResult};
use crate::format::{format_resp_from_results, skipped_format_response};
use crate::hugepages::{HugePageCleaner, HugePageDir};
use crate::output::{DevNullRedirect, OutputGuard, StdoutRedirect};
use crate::request::{
    FormatRequest, FormatResponse, PrepareRequest, PrepareResponse, ScanRequest, ScanResponse,
};
use crate::script::{ScriptRunner, SetupScript};
use crate::user::{SystemUsers, UserResolver};
use crate::vmd::{LspciPipeline, VmdLister, parse_vmd_listing};

/// Orchestrates device discovery, formatting, preparation and firmware
/// updates over a [`Binding`]
///
/// Every binding call runs inside an init/fini bracket with stdout
/// suppressed. Operations take `&mut self`; callers sharing a backend across
/// threads must serialize access themselves.
pub struct Backend<B: Binding> {
    binding: B,
    redirect: Box<dyn StdoutRedirect>,
    script: Box<dyn ScriptRunner>,
    vmd: Box<dyn VmdLister>,
    hugepages: Box<dyn HugePageCleaner>,
    users: Box<dyn UserResolver>,
    vmd_disabled: bool,
}

/// Builder for [`Backend`]
///
/// Collaborators not supplied default to the real system implementations.
pub struct BackendBuilder<B: Binding> {
    binding: B,
    redirect: Option<Box<dyn StdoutRedirect>>,
    script: Option<Box<dyn ScriptRunner>>,
    vmd: Option<Box<dyn VmdLister>>,
    hugepages: Option<Box<dyn HugePageCleaner>>,
    users: Option<Box<dyn UserResolver>>,
    vmd_disabled: bool,
}

impl<B: Binding> BackendBuilder<B> {
    /// Stdout redirect used around binding calls.
    #[must_use]
    pub fn redirect(mut self, redirect: impl StdoutRedirect + 'static) -> Self {
        self.redirect = Some(Box::new(redirect));
        self
    }

    /// Setup script runner.
    #[must_use]
    pub fn script(mut self, script: impl ScriptRunner + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    /// Source of the filtered PCI listing for VMD detection.
    #[must_use]
    pub fn vmd_lister(mut self, vmd: impl VmdLister + 'static) -> Self {
        self.vmd = Some(Box::new(vmd));
        self
    }

    /// Huge-page cleaner.
    #[must_use]
    pub fn hugepages(mut self, hugepages: impl HugePageCleaner + 'static) -> Self {
        self.hugepages = Some(Box::new(hugepages));
        self
    }

    /// User resolver.
    #[must_use]
    pub fn users(mut self, users: impl UserResolver + 'static) -> Self {
        self.users = Some(Box::new(users));
        self
    }

    /// Disable VMD awareness for every operation.
    #[must_use]
    pub fn disable_vmd(mut self, disabled: bool) -> Self {
        self.vmd_disabled = disabled;
        self
    }

    /// Build the backend.
    pub fn build(self) -> Backend<B> {
        Backend {
            binding: self.binding,
            redirect: self
                .redirect
                .unwrap_or_else(|| Box::new(DevNullRedirect::new())),
            script: self.script.unwrap_or_else(|| Box::new(SetupScript::default())),
            vmd: self.vmd.unwrap_or_else(|| Box::new(LspciPipeline::default())),
            hugepages: self
                .hugepages
                .unwrap_or_else(|| Box::new(HugePageDir::default())),
            users: self.users.unwrap_or_else(|| Box::new(SystemUsers)),
            vmd_disabled: self.vmd_disabled,
        }
    }
}

impl<B: Binding> Backend<B> {
    /// Start building a backend over `binding`.
    pub fn builder(binding: B) -> BackendBuilder<B> {
        BackendBuilder {
            binding,
            redirect: None,
            script: None,
            vmd: None,
            hugepages: None,
            users: None,
            vmd_disabled: false,
        }
    }

    /// Backend over `binding` with system collaborators.
    pub fn new(binding: B) -> Self {
        Self::builder(binding).build()
    }

    /// Backend over `binding` with collaborators taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BdevError::Config`] if the configuration is invalid.
    pub fn from_config(binding: B, config: &BackendConfig) -> BdevResult<Self> {
        config.validate()?;
        Ok(Self::builder(binding)
            .script(config.setup_script())
            .hugepages(config.hugepage_dir())
            .disable_vmd(config.disable_vmd)
            .build())
    }

    /// Turn off VMD awareness.
    pub fn disable_vmd(&mut self) {
        self.vmd_disabled = true;
    }

    /// Whether VMD awareness is off.
    pub fn is_vmd_disabled(&self) -> bool {
        self.vmd_disabled
    }

    /// Discover NVMe controllers visible to the native environment.
    ///
    /// # Errors
    ///
    /// Returns [`BdevError::SuppressOutput`], [`BdevError::EnvInit`] or
    /// [`BdevError::Discover`] naming the phase that failed.
    pub fn scan(&mut self, req: &ScanRequest) -> BdevResult<ScanResponse> {
        let opts = EnvOptions::default()
            .with_include_list(req.device_list.iter().cloned())
            .with_vmd_disabled(self.vmd_disabled || req.disable_vmd);

        let _guard =
            OutputGuard::acquire(self.redirect.as_mut()).map_err(BdevError::SuppressOutput)?;
        let mut session =
            EnvSession::start(&mut self.binding, &opts).map_err(BdevError::EnvInit)?;
        let controllers = session.discover().map_err(BdevError::Discover)?;

        for ctrlr in &controllers {
            debug!(
                pci_addr = %ctrlr.pci_addr,
                namespaces = ?ctrlr.namespace_ids(),
                total_bytes = ctrlr.total_bytes(),
                vmd_backed = ctrlr.vmd_backed,
                "nvme controller discovered"
            );
        }
        debug!(count = controllers.len(), "nvme controllers discovered");
        Ok(ScanResponse { controllers })
    }

    /// Format every device in the request.
    ///
    /// Non-native classes are recorded as skipped without touching the
    /// binding. NVMe devices are formatted through the native environment
    /// and per-namespace failures are reported per device.
    ///
    /// # Errors
    ///
    /// Fails as a whole only when the native layer could not be driven:
    /// empty device list, environment init, the format call itself, an
    /// empty or inconsistent result set.
    pub fn format(&mut self, req: &FormatRequest) -> BdevResult<FormatResponse> {
        if !req.class.is_native() {
            for device in &req.device_list {
                debug!(class = %req.class, device, "format for non-NVMe bdev skipped");
            }
            return Ok(skipped_format_response(&req.device_list));
        }
        if req.device_list.is_empty() {
            return Err(BdevError::EmptyDeviceList);
        }
        self.format_nvme(req)
    }

    fn format_nvme(&mut self, req: &FormatRequest) -> BdevResult<FormatResponse> {
        let mut opts = EnvOptions::default()
            .with_include_list(req.device_list.iter().cloned())
            .with_vmd_disabled(self.vmd_disabled || req.disable_vmd);
        if let Some(mem_size_mb) = req.mem_size_mb {
            opts = opts.with_mem_size_mb(mem_size_mb);
        }

        let _guard =
            OutputGuard::acquire(self.redirect.as_mut()).map_err(BdevError::SuppressOutput)?;
        let mut session =
            EnvSession::start(&mut self.binding, &opts).map_err(BdevError::EnvInit)?;

        let results = session.format();
        if let Err(e) = session.clean_lock_files(&req.device_list) {
            error!(error = %e, "cleanup failed after format");
        }
        drop(session);

        let results = results.map_err(|source| BdevError::Format {
            devices: req.device_list.clone(),
            source,
        })?;
        if results.is_empty() {
            return Err(BdevError::EmptyFormatResults);
        }

        let resp = format_resp_from_results(&results)?;
        info!(
            devices = resp.len(),
            failed = resp.faults().count(),
            "nvme format complete"
        );
        Ok(resp)
    }

    /// Hand devices to the user-space driver for the target user.
    ///
    /// Resolves the user, runs the setup script, reclaims the user's stale
    /// huge pages and re-prepares any VMD bridges, in that order. The last
    /// two steps can be turned off in the request.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; nothing after it runs.
    pub fn prepare(&mut self, req: &PrepareRequest) -> BdevResult<PrepareResponse> {
        debug!(?req, "backend prepare");

        let uid = self
            .users
            .lookup_uid(&req.target_user)
            .map_err(|source| BdevError::UserLookup {
                user: req.target_user.clone(),
                source,
            })?;

        self.script
            .prepare(req)
            .map_err(BdevError::script("re-binding ssds to attach with spdk"))?;

        if !req.disable_clean_hugepages {
            let removed = self.hugepages.clean(uid).map_err(BdevError::HugePages)?;
            debug!(uid, removed, "stale huge pages reclaimed");
        }

        let mut resp = PrepareResponse::default();
        if !(req.disable_vmd || self.vmd_disabled) {
            resp.vmd_detected = self.vmd_prep(req)?;
        }
        Ok(resp)
    }

    fn vmd_prep(&mut self, req: &PrepareRequest) -> BdevResult<bool> {
        let listing = self.vmd.list().map_err(BdevError::VmdDetect)?;
        let vmd_addrs = parse_vmd_listing(&listing).map_err(BdevError::VmdDetect)?;
        if vmd_addrs.is_empty() {
            debug!("no VMD devices, no re-prepare needed");
            return Ok(false);
        }

        let vmd_req = PrepareRequest {
            pci_allow_list: vmd_addrs,
            ..req.clone()
        };
        self.script
            .prepare(&vmd_req)
            .map_err(BdevError::script("re-binding vmd ssds to attach with spdk"))?;

        info!(devices = ?vmd_req.pci_allow_list, "volume management devices detected");
        Ok(true)
    }

    /// Return every device to its kernel driver.
    ///
    /// # Errors
    ///
    /// Returns [`BdevError::Script`] if the reset script fails.
    pub fn prepare_reset(&mut self) -> BdevResult<()> {
        debug!("backend prepare reset");
        self.script
            .reset()
            .map_err(BdevError::script("resetting ssds to kernel drivers"))
    }

    /// Write `firmware` to `slot` on the controller at `pci_addr` and
    /// commit it.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::BadPciAddr`] for an empty address,
    /// [`Fault::PciAddrNotFound`] when discovery does not report the
    /// address, and a phase error otherwise.
    pub fn update_firmware(
        &mut self,
        pci_addr: &str,
        firmware: &Path,
        slot: i32,
    ) -> BdevResult<()> {
        if pci_addr.is_empty() {
            return Err(Fault::bad_pci_addr(pci_addr).into());
        }

        let opts = EnvOptions::default().with_vmd_disabled(self.vmd_disabled);

        let _guard =
            OutputGuard::acquire(self.redirect.as_mut()).map_err(BdevError::SuppressOutput)?;
        let mut session =
            EnvSession::start(&mut self.binding, &opts).map_err(BdevError::EnvInit)?;

        let controllers = session.discover().map_err(BdevError::Discover)?;
        if !controllers.iter().any(|c| c.pci_addr == pci_addr) {
            return Err(Fault::pci_addr_not_found(pci_addr).into());
        }

        session
            .update(pci_addr, firmware, slot)
            .map_err(|source| BdevError::FirmwareUpdate {
                pci_addr: pci_addr.to_string(),
                source,
            })?;

        info!(pci_addr, firmware = %firmware.display(), slot, "firmware updated");
        Ok(())
    }
}

#[cfg(feature = "native")]
#[cfg_attr(docsrs, doc(cfg(feature = "native")))]
impl Backend<storctl_binding::NativeBinding> {
    /// Backend over the native binding and collaborators described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// As [`BackendConfig::native_binding`].
    pub fn native_from_config(config: &BackendConfig) -> BdevResult<Self> {
        let binding = config.native_binding()?;
        Self::from_config(binding, config)
    }
}

impl<B: Binding + std::fmt::Debug> std::fmt::Debug for Backend<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("binding", &self.binding)
            .field("vmd_disabled", &self.vmd_disabled)
            .finish_non_exhaustive()
    }
}
