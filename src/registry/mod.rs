//! Vendor/purpose reference registry
//!
//! Static lookup of vendor name ↔ id ↔ required purposes ↔ labels. Each CMP
//! backend gets its own registry instance because the id namespaces differ.
//!
//! Every registry carries a [`BaselinePurposePolicy`]: the purpose that is
//! always part of a vendor's required set. The policy is scoped to the
//! backend; there is no rule for translating between the two numbering
//! schemes.

mod catalogue;

use std::collections::HashMap;

use crate::domain::{CmpBackend, PurposeId, Vendor, VendorId, VendorRef};
use crate::error::{ConsentError, Result};

pub use catalogue::{liveramp_purposes, lr_purpose, sourcepoint_purposes, sp_purpose, vendor};

/// Purpose force-appended to every vendor's required set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselinePurposePolicy {
    purpose: PurposeId,
}

impl BaselinePurposePolicy {
    pub fn new(purpose: PurposeId) -> Self {
        Self { purpose }
    }

    pub fn purpose(&self) -> &PurposeId {
        &self.purpose
    }

    /// Append the baseline, de-duplicate and sort ascending.
    pub fn apply(&self, purposes: &[PurposeId]) -> Vec<PurposeId> {
        let mut out: Vec<PurposeId> = purposes.to_vec();
        out.push(self.purpose.clone());
        out.sort();
        out.dedup();
        out
    }
}

/// Static vendor/purpose lookup for one CMP backend
#[derive(Debug, Clone)]
pub struct VendorPurposeRegistry {
    backend: CmpBackend,
    baseline: BaselinePurposePolicy,
    vendors: Vec<Vendor>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<VendorId, usize>,
}

impl VendorPurposeRegistry {
    /// Build a registry, normalizing every vendor's purposes through the
    /// baseline policy.
    ///
    /// Fails if a name or id is used twice, or an id does not belong to the
    /// backend's namespace.
    pub fn new(
        backend: CmpBackend,
        baseline: BaselinePurposePolicy,
        vendors: Vec<Vendor>,
    ) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(vendors.len());
        let mut by_id = HashMap::with_capacity(vendors.len());
        let mut normalized = Vec::with_capacity(vendors.len());

        for (index, mut vendor) in vendors.into_iter().enumerate() {
            let id_fits = matches!(
                (backend, &vendor.id),
                (CmpBackend::LiveRamp, VendorId::Numeric(_))
                    | (CmpBackend::Sourcepoint, VendorId::Opaque(_))
            );
            if !id_fits {
                return Err(ConsentError::InvalidId {
                    backend,
                    kind: "vendor",
                    value: vendor.id.to_string(),
                });
            }
            if by_name.insert(vendor.name.clone(), index).is_some() {
                return Err(ConsentError::Registry(format!(
                    "duplicate vendor name {:?}",
                    vendor.name
                )));
            }
            if by_id.insert(vendor.id.clone(), index).is_some() {
                return Err(ConsentError::Registry(format!(
                    "duplicate vendor id {}",
                    vendor.id
                )));
            }
            vendor.purpose_ids = baseline.apply(&vendor.purpose_ids);
            normalized.push(vendor);
        }

        Ok(Self {
            backend,
            baseline,
            vendors: normalized,
            by_name,
            by_id,
        })
    }

    /// The shipped LiveRamp catalogue (numeric ids, baseline purpose 1).
    pub fn liveramp() -> Self {
        catalogue::liveramp()
    }

    /// The shipped Sourcepoint catalogue (opaque ids, baseline "store and/or
    /// access information on a device").
    pub fn sourcepoint() -> Self {
        catalogue::sourcepoint()
    }

    /// The shipped catalogue for a backend.
    pub fn for_backend(backend: CmpBackend) -> Self {
        match backend {
            CmpBackend::LiveRamp => Self::liveramp(),
            CmpBackend::Sourcepoint => Self::sourcepoint(),
        }
    }

    pub fn backend(&self) -> CmpBackend {
        self.backend
    }

    pub fn baseline(&self) -> &BaselinePurposePolicy {
        &self.baseline
    }

    pub fn vendors(&self) -> &[Vendor] {
        &self.vendors
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&Vendor> {
        self.by_name.get(name).map(|&i| &self.vendors[i])
    }

    /// Look up a vendor by its id in string form.
    ///
    /// The string is parsed in this registry's namespace; a value that does
    /// not fit the namespace is simply unknown.
    pub fn lookup_by_id(&self, id: &str) -> Option<&Vendor> {
        let id = self.backend.parse_vendor_id(id).ok()?;
        self.lookup_vendor_id(&id)
    }

    pub fn lookup_vendor_id(&self, id: &VendorId) -> Option<&Vendor> {
        self.by_id.get(id).map(|&i| &self.vendors[i])
    }

    pub fn is_known_id(&self, id: &str) -> bool {
        self.lookup_by_id(id).is_some()
    }

    pub fn resolve(&self, vendor: &VendorRef) -> Option<&Vendor> {
        match vendor {
            VendorRef::ByName(name) => self.lookup_by_name(name),
            VendorRef::ById(id) => self.lookup_by_id(id),
        }
    }

    /// Resolve or fail with [`ConsentError::UnknownVendor`].
    pub fn require(&self, vendor: &VendorRef) -> Result<&Vendor> {
        self.resolve(vendor)
            .ok_or_else(|| ConsentError::UnknownVendor(vendor.to_string()))
    }

    /// Required purposes for a vendor: baseline included, no duplicates,
    /// ascending. Unknown references yield an empty list.
    pub fn required_purpose_ids(&self, vendor: &VendorRef) -> Vec<PurposeId> {
        self.resolve(vendor)
            .map(|v| v.purpose_ids.clone())
            .unwrap_or_default()
    }

    pub fn vendor_id(&self, name: &str) -> Option<&VendorId> {
        self.lookup_by_name(name).map(|v| &v.id)
    }

    pub fn vendor_label(&self, vendor: &VendorRef) -> Option<&str> {
        self.resolve(vendor).map(|v| v.label.as_str())
    }

    pub fn toggle_label(&self, vendor: &VendorRef) -> Option<&str> {
        self.resolve(vendor).and_then(|v| v.toggle_label.as_deref())
    }

    pub fn all_vendor_ids(&self) -> Vec<&VendorId> {
        self.vendors.iter().map(|v| &v.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ids: &[u32]) -> Vec<PurposeId> {
        ids.iter().copied().map(PurposeId::Numeric).collect()
    }

    #[test]
    fn test_baseline_policy_sorts_and_dedups() {
        let policy = BaselinePurposePolicy::new(PurposeId::Numeric(1));
        assert_eq!(policy.apply(&numeric(&[7, 1, 3, 7])), numeric(&[1, 3, 7]));
        assert_eq!(policy.apply(&[]), numeric(&[1]));
    }

    #[test]
    fn test_lookup_by_name_and_id() {
        let registry = VendorPurposeRegistry::sourcepoint();
        let maps = registry.lookup_by_name("google_maps").unwrap();
        assert_eq!(maps.id, VendorId::Opaque("5eb97b265852312e6a9fbf31".into()));

        let same = registry.lookup_by_id("5eb97b265852312e6a9fbf31").unwrap();
        assert_eq!(same.name, "google_maps");
        assert!(registry.is_known_id("5eb97b265852312e6a9fbf31"));
        assert!(!registry.is_known_id("google_maps"));
    }

    #[test]
    fn test_unknown_reference_is_empty() {
        let registry = VendorPurposeRegistry::liveramp();
        assert!(registry
            .required_purpose_ids(&VendorRef::name("myspace"))
            .is_empty());
        assert!(registry.required_purpose_ids(&VendorRef::id("abc")).is_empty());
        assert!(registry.vendor_label(&VendorRef::id("99999")).is_none());
        assert!(matches!(
            registry.require(&VendorRef::name("myspace")),
            Err(ConsentError::UnknownVendor(_))
        ));
    }

    #[test]
    fn test_required_purposes_include_baseline() {
        let registry = VendorPurposeRegistry::sourcepoint();
        for vendor in registry.vendors() {
            let purposes = registry.required_purpose_ids(&VendorRef::name(vendor.name.clone()));
            assert!(purposes.contains(registry.baseline().purpose()));
            let mut sorted = purposes.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(purposes, sorted);
        }
    }

    #[test]
    fn test_name_and_id_refs_agree() {
        let registry = VendorPurposeRegistry::liveramp();
        let by_name = registry.required_purpose_ids(&VendorRef::name("youtube"));
        let id = registry.vendor_id("youtube").unwrap().to_string();
        assert_eq!(by_name, registry.required_purpose_ids(&VendorRef::id(id)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let vendors = vec![
            Vendor::new("a", VendorId::Numeric(1), "A", None, vec![]),
            Vendor::new("a", VendorId::Numeric(2), "A2", None, vec![]),
        ];
        let result = VendorPurposeRegistry::new(
            CmpBackend::LiveRamp,
            BaselinePurposePolicy::new(PurposeId::Numeric(1)),
            vendors,
        );
        assert!(matches!(result, Err(ConsentError::Registry(_))));
    }

    #[test]
    fn test_foreign_id_scheme_rejected() {
        let vendors = vec![Vendor::new(
            "a",
            VendorId::Opaque("5e71".into()),
            "A",
            None,
            vec![],
        )];
        let result = VendorPurposeRegistry::new(
            CmpBackend::LiveRamp,
            BaselinePurposePolicy::new(PurposeId::Numeric(1)),
            vendors,
        );
        assert!(matches!(result, Err(ConsentError::InvalidId { .. })));
    }

    #[test]
    fn test_labels() {
        let registry = VendorPurposeRegistry::sourcepoint();
        assert_eq!(
            registry.toggle_label(&VendorRef::name("youtube")),
            Some("YouTube-Videos anzeigen")
        );
        assert_eq!(registry.toggle_label(&VendorRef::name("xandr")), None);
        assert_eq!(
            registry.vendor_label(&VendorRef::name("xandr")),
            Some("Xandr, Inc.")
        );
    }
}
