use std::sync::Arc;

use cw_archive::{Archive, ArchiveSet, FatEntry, FragmentCodec, ImportReport};
use cw_serializer::{Resource, ResourceFile, Serializable};
use cw_store::{CacheKey, FileData, FileEntry, StoreError};
use cw_types::{CompressionFlags, Revision};
use tracing::debug;

use crate::decoded::{DecodedResource, ResourceReport};
use crate::error::{SdkError, SdkResult};

/// One handle over the codec, the mounted archives and the file database.
///
/// The toolkit owns its database and archives; every call takes the
/// revision and compression settings from the toolkit, never from globals.
pub struct Toolkit {
    revision: Revision,
    compression: CompressionFlags,
    db: FileData,
    archives: ArchiveSet,
    fragments: FragmentCodec,
}

impl Toolkit {
    /// In-memory toolkit targeting the default revision with full compression.
    pub fn new() -> Self {
        Self::with_database(FileData::in_memory())
    }

    pub fn with_database(db: FileData) -> Self {
        Self {
            revision: Revision::default(),
            compression: CompressionFlags::ALL,
            db,
            archives: ArchiveSet::new(),
            fragments: FragmentCodec::default(),
        }
    }

    /// Target `revision`, rejecting unknown branch combinations.
    pub fn with_revision(mut self, revision: Revision) -> SdkResult<Self> {
        revision.validate()?;
        self.revision = revision;
        Ok(self)
    }

    pub fn with_compression(mut self, compression: CompressionFlags) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_fragment_codec(mut self, fragments: FragmentCodec) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn compression(&self) -> CompressionFlags {
        self.compression
    }

    pub fn database(&self) -> &FileData {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut FileData {
        &mut self.db
    }

    pub fn archives(&self) -> &ArchiveSet {
        &self.archives
    }

    // ---- Codec ----

    pub fn serialize<T: Serializable + Clone>(&self, value: &T) -> SdkResult<Vec<u8>> {
        Ok(cw_serializer::serialize(value, self.revision, self.compression)?)
    }

    pub fn deserialize<T: Serializable>(&self, bytes: &[u8]) -> SdkResult<T> {
        Ok(cw_serializer::deserialize(bytes, self.revision)?)
    }

    /// Round-trip `value` and check that it re-encodes identically.
    pub fn verify<T: Serializable + Clone>(&self, value: &T) -> SdkResult<Vec<u8>> {
        Ok(cw_serializer::verify(value, self.revision, self.compression)?)
    }

    /// Frame `value` as a standalone resource file.
    pub fn encode_resource<T: Resource + Clone>(&self, value: &T) -> SdkResult<Vec<u8>> {
        Ok(cw_serializer::encode_resource(
            &mut value.clone(),
            self.revision,
            self.compression,
        )?)
    }

    /// Decode a resource file. The file's own revision wins over the toolkit's.
    pub fn decode_resource<T: Resource>(&self, bytes: &[u8]) -> SdkResult<T> {
        Ok(cw_serializer::decode_resource(bytes).map(|(value, _)| value)?)
    }

    /// Decode a resource file of any supported type, with its header summary.
    pub fn inspect(&self, bytes: &[u8]) -> SdkResult<ResourceReport> {
        let file = ResourceFile::parse(bytes)?;
        let resource = DecodedResource::from_file(&file)?;
        Ok(ResourceReport {
            revision: file.revision,
            compression: file.compression()?.bits(),
            dependencies: file.dependencies,
            resource,
        })
    }

    // ---- Archives ----

    /// Parse a decrypted archive.
    pub fn open_archive(&self, bytes: Vec<u8>) -> SdkResult<Archive> {
        Ok(cw_archive::open_archive(bytes)?)
    }

    /// Decrypt and assemble fragments, then parse the archive.
    pub fn open_fragments(&self, fragments: &[Option<Vec<u8>>]) -> SdkResult<Archive> {
        Ok(self.fragments.open(fragments)?)
    }

    /// The exact bytes of `entry` in `archive`.
    pub fn extract<'a>(&self, archive: &'a Archive, entry: &FatEntry) -> SdkResult<&'a [u8]> {
        Ok(archive.extract(entry)?)
    }

    /// Make `archive` a fallback source for database reads.
    pub fn mount(&mut self, archive: Archive) {
        debug!(entries = archive.len(), "mounting archive");
        self.archives.push(archive);
    }

    /// Copy every recoverable mounted blob into the database's object store.
    pub fn import_archives(&self) -> SdkResult<ImportReport> {
        Ok(self.archives.import_into(&self.db)?)
    }

    // ---- Store ----

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.db.get(path)
    }

    /// Store `data` under `path`, creating or updating the entry.
    pub fn put(&mut self, path: &str, data: &[u8]) -> SdkResult<&FileEntry> {
        let id = self.db.put(path, data)?;
        self.db
            .entry(id)
            .ok_or_else(|| SdkError::NotFound(path.to_string()))
    }

    /// Bytes behind `path`, from the object store or any mounted archive.
    pub fn read(&self, path: &str) -> SdkResult<Vec<u8>> {
        let entry = self
            .db
            .get(path)
            .ok_or_else(|| SdkError::NotFound(path.to_string()))?;
        match self.db.read_entry(entry) {
            Ok(bytes) => Ok(bytes),
            Err(StoreError::NotFound(_)) => self
                .archives
                .read(&entry.hash())?
                .map(<[u8]>::to_vec)
                .ok_or_else(|| SdkError::NotFound(format!("{path} ({})", entry.hash()))),
            Err(err) => Err(err.into()),
        }
    }

    /// Decode the resource at `path`, caching the value on its entry.
    pub fn load<T>(&mut self, path: &str) -> SdkResult<Arc<T>>
    where
        T: Resource + Send + Sync + 'static,
    {
        if let Some(value) = self.cached::<T>(path) {
            return Ok(value);
        }
        let bytes = self.read(path)?;
        let value: T = self.decode_resource(&bytes)?;
        if let Some(mut entry) = self.db.get_mut(path) {
            entry.set_cached(CacheKey::RESOURCE, value);
        }
        self.cached(path)
            .ok_or_else(|| SdkError::NotFound(path.to_string()))
    }

    fn cached<T: Send + Sync + 'static>(&self, path: &str) -> Option<Arc<T>> {
        self.db.get(path)?.cached(CacheKey::RESOURCE)
    }
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field("revision", &self.revision)
            .field("compression", &self.compression)
            .field("entries", &self.db.len())
            .field("archives", &self.archives.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_archive::{ArchiveKind, ArchiveWriter};
    use cw_resources::{GfxMaterialHeader, Level, PPos, Thing, ThingGraph};
    use cw_types::{Branch, ContentHash, ResourceType, TypeError};
    use glam::{Mat4, Vec3};

    fn level() -> Level {
        let mut graph = ThingGraph::new();
        let world = graph.add(Thing::new(1));
        let mut crate_thing = Thing::new(2);
        crate_thing.pos = Some(PPos {
            world_position: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            local_position: Mat4::IDENTITY,
            anim_hash: 0,
        });
        graph.add_child(world, crate_thing);
        Level {
            graph,
            world: Some(world),
        }
    }

    fn material() -> GfxMaterialHeader {
        GfxMaterialHeader {
            flags: 1,
            cosine_power: 4.0,
            ..GfxMaterialHeader::default()
        }
    }

    /// Level and material resource files packed into encrypted fragments.
    fn shipped(toolkit: &Toolkit) -> (Vec<Option<Vec<u8>>>, Vec<u8>, Vec<u8>) {
        let level = toolkit.encode_resource(&level()).unwrap();
        let material = toolkit.encode_resource(&material()).unwrap();
        let mut writer = ArchiveWriter::new(ArchiveKind::Far4);
        writer.add(&level).unwrap();
        writer.add(&material).unwrap();
        let fragments = FragmentCodec::default()
            .with_fragment_size(32)
            .split(&writer.finish_to_bytes().unwrap())
            .unwrap()
            .into_iter()
            .map(Some)
            .collect();
        (fragments, level, material)
    }

    fn toolkit() -> Toolkit {
        Toolkit::new().with_fragment_codec(FragmentCodec::default().with_fragment_size(32))
    }

    #[test]
    fn codec_roundtrip() {
        let toolkit = Toolkit::new();
        let bytes = toolkit.serialize(&level()).unwrap();
        assert_eq!(toolkit.deserialize::<Level>(&bytes).unwrap(), level());
        assert_eq!(toolkit.verify(&level()).unwrap(), bytes);
    }

    #[test]
    fn branch_revision_is_validated() {
        let bad = Revision::new(0x3f8, 0, Branch::Leerdammer.id());
        let err = Toolkit::new().with_revision(bad).unwrap_err();
        assert!(matches!(err, SdkError::Type(TypeError::BranchHeadMismatch { .. })));

        let toolkit = Toolkit::new()
            .with_revision(Branch::Leerdammer.revision())
            .unwrap();
        let bytes = toolkit.encode_resource(&level()).unwrap();
        // The file carries its revision, so any toolkit can decode it.
        assert_eq!(Toolkit::new().decode_resource::<Level>(&bytes).unwrap(), level());
    }

    #[test]
    fn archive_to_store_to_codec() {
        let mut toolkit = toolkit();
        let (fragments, level_bytes, material_bytes) = shipped(&toolkit);

        let archive = toolkit.open_fragments(&fragments).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(toolkit.extract(&archive, &archive.entries()[0]).unwrap(), level_bytes);
        toolkit.mount(archive);

        let db = toolkit.database_mut();
        db.create(
            "levels/intro.lvl",
            ContentHash::from_bytes(&level_bytes),
            level_bytes.len() as u64,
        )
        .unwrap();
        db.create(
            "materials/cardboard.gmat",
            ContentHash::from_bytes(&material_bytes),
            material_bytes.len() as u64,
        )
        .unwrap();

        let loaded = toolkit.load::<Level>("levels/intro.lvl").unwrap();
        assert_eq!(*loaded, level());
        let again = toolkit.load::<Level>("levels/intro.lvl").unwrap();
        assert!(Arc::ptr_eq(&loaded, &again));

        let header = toolkit.load::<GfxMaterialHeader>("materials/cardboard.gmat").unwrap();
        assert_eq!(*header, material());
    }

    #[test]
    fn lost_fragment_surfaces_as_not_found() {
        let mut toolkit = toolkit();
        let (mut fragments, level_bytes, _) = shipped(&toolkit);
        fragments[0] = None;
        let archive = toolkit.open_fragments(&fragments).unwrap();
        assert_eq!(archive.skipped().len(), 1);
        toolkit.mount(archive);
        toolkit
            .database_mut()
            .create(
                "levels/intro.lvl",
                ContentHash::from_bytes(&level_bytes),
                level_bytes.len() as u64,
            )
            .unwrap();

        assert!(matches!(toolkit.read("levels/intro.lvl"), Err(SdkError::NotFound(_))));
        assert!(toolkit.load::<Level>("levels/intro.lvl").is_err());
    }

    #[test]
    fn import_makes_blobs_local() {
        let mut toolkit = toolkit();
        let (fragments, level_bytes, _) = shipped(&toolkit);
        let archive = toolkit.open_fragments(&fragments).unwrap();
        toolkit.mount(archive);

        let report = toolkit.import_archives().unwrap();
        assert_eq!(report.imported, 2);
        let hash = ContentHash::from_bytes(&level_bytes);
        assert!(toolkit.database().store().exists(&hash).unwrap());
        assert_eq!(toolkit.import_archives().unwrap().already_present, 2);
    }

    #[test]
    fn put_get_read() {
        let mut toolkit = Toolkit::new();
        let entry = toolkit.put("scripts/hello.ff", b"hello").unwrap();
        assert_eq!(entry.size(), 5);
        assert_eq!(toolkit.get("scripts/hello.ff").unwrap().hash(), ContentHash::from_bytes(b"hello"));
        assert_eq!(toolkit.read("scripts/hello.ff").unwrap(), b"hello");
        assert!(toolkit.get("scripts/missing.ff").is_none());
        assert!(matches!(toolkit.read("scripts/missing.ff"), Err(SdkError::NotFound(_))));
    }

    #[test]
    fn inspect_dispatches_on_header() {
        let toolkit = Toolkit::new();
        let report = toolkit.inspect(&toolkit.encode_resource(&level()).unwrap()).unwrap();
        assert_eq!(report.resource.resource_type(), ResourceType::Level);
        assert_eq!(report.compression, CompressionFlags::ALL.bits());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["resource"]["type"], "Level");
        assert_eq!(json["resource"]["value"]["world"], 0);
    }

    #[test]
    fn wrong_resource_type_is_rejected() {
        let toolkit = Toolkit::new();
        let bytes = toolkit.encode_resource(&material()).unwrap();
        assert!(matches!(
            toolkit.decode_resource::<Level>(&bytes),
            Err(SdkError::Serializer(_))
        ));
    }
}
