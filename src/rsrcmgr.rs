// The Resource Manager materializes resources as Memory Manager handles on
// demand, caching by type and id. Lookups miss first into the application
// file, then into the optional System file, mirroring Mac OS search order.

use std::collections::HashMap;

use log::info;

use crate::errors::Result;
use crate::memmap::{globals, SystemMemory};
use crate::memmgr::MemoryManager;
use crate::records::{os_type, os_type_name, Handle, OSType, ResId};
use crate::rsrc::{Resource, ResourceFile};

/// The Mac OS `resNotFound` error code surfaced through the ResErr global.
pub const RES_NOT_FOUND: i16 = -192;

fn cache_key(type_id: OSType, id: ResId) -> String {
    format!("Resource[{}:{}]", os_type_name(type_id), id)
}

pub struct ResourceManager {
    memory: SystemMemory,
    file: ResourceFile,
    system_file: Option<ResourceFile>,
    cache: HashMap<String, Handle>,
    attributes: HashMap<Handle, u8>,
}

impl ResourceManager {
    pub fn new(memory: SystemMemory, file: ResourceFile, system_file: Option<ResourceFile>) -> Self {
        ResourceManager {
            memory,
            file,
            system_file,
            cache: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// The attribute byte of the resource behind `handle` (GetResAttrs).
    pub fn attributes_for(&self, handle: Handle) -> u8 {
        self.attributes.get(&handle).copied().unwrap_or(0)
    }

    /// 'CODE' 0, the jump table, read directly from the application file.
    pub fn segment_zero(&self) -> Option<&Resource> {
        self.file.find(os_type(b"CODE"), 0)
    }

    pub fn system_file(&self) -> Option<&ResourceFile> {
        self.system_file.as_ref()
    }

    fn lookup(&self, type_id: OSType, id: ResId) -> Option<&Resource> {
        self.file
            .find(type_id, id)
            .or_else(|| self.system_file.as_ref().and_then(|system| system.find(type_id, id)))
    }

    fn miss(&self) -> Result<Handle> {
        self.memory.region().write_i16(globals::RES_ERR as usize, RES_NOT_FOUND)?;
        Ok(0)
    }

    /// Returns a handle to a copy of the resource data, or 0 with `ResErr`
    /// set to -192 when neither file has it.
    pub fn get_resource(
        &mut self,
        mem: &mut MemoryManager,
        type_id: OSType,
        id: ResId,
    ) -> Result<Handle> {
        let key = cache_key(type_id, id);
        if let Some(&handle) = self.cache.get(&key) {
            return Ok(handle);
        }

        let (data, attributes) = match self.lookup(type_id, id) {
            Some(resource) => (resource.data().clone(), resource.attributes()),
            None => return self.miss(),
        };
        let handle = mem.allocate_handle_for_region(&data, &key)?;
        self.cache.insert(key, handle);
        self.attributes.insert(handle, attributes);
        Ok(handle)
    }

    /// Name-based lookup in the application file only.
    pub fn get_resource_by_name(
        &mut self,
        mem: &mut MemoryManager,
        type_id: OSType,
        name: &str,
    ) -> Result<Handle> {
        let (id, key) = match self.file.find_by_name(type_id, name) {
            Some(resource) => (resource.id(), cache_key(type_id, resource.id())),
            None => return self.miss(),
        };

        if let Some(&handle) = self.cache.get(&key) {
            info!("returning cached handle for {}", key);
            return Ok(handle);
        }
        // Re-resolved by id so the cache stays keyed one way.
        self.get_resource(mem, type_id, id)
    }

    /// Every (id, name) pair of `type_id` across both files (AppendResMenu).
    pub fn ids_for_type(&self, type_id: OSType) -> Vec<(ResId, String)> {
        let mut ids = Vec::new();
        let mut collect = |file: &ResourceFile| {
            if let Some(group) = file.group(type_id) {
                for resource in group.resources() {
                    ids.push((resource.id(), resource.name().to_string()));
                }
            }
        };
        collect(&self.file);
        if let Some(system) = &self.system_file {
            collect(system);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegion;
    use crate::rsrc::ResourceGroup;

    fn file_with(type_tag: &[u8; 4], id: ResId, bytes: Vec<u8>) -> ResourceFile {
        let data = MemoryRegion::from_vec("data", bytes);
        ResourceFile::from_groups(vec![ResourceGroup::new(
            os_type(type_tag),
            vec![Resource::new(id, 0, String::new(), data)],
        )])
    }

    #[test]
    fn caches_handles_per_type_and_id() {
        let memory = SystemMemory::new();
        let mut mem = MemoryManager::new(memory.clone());
        let file = file_with(b"MENU", 7, vec![1, 2, 3]);
        let mut rsrc = ResourceManager::new(memory, file, None);

        let first = rsrc.get_resource(&mut mem, os_type(b"MENU"), 7).unwrap();
        let second = rsrc.get_resource(&mut mem, os_type(b"MENU"), 7).unwrap();
        assert_ne!(first, 0);
        assert_eq!(first, second);
        assert_eq!(mem.handle_size(first).unwrap(), 3);
    }

    #[test]
    fn miss_sets_res_err_and_returns_null_handle() {
        let memory = SystemMemory::new();
        let mut mem = MemoryManager::new(memory.clone());
        let file = file_with(b"MENU", 7, vec![1]);
        let mut rsrc = ResourceManager::new(memory.clone(), file, None);

        let handle = rsrc.get_resource(&mut mem, os_type(b"DLOG"), 300).unwrap();
        assert_eq!(handle, 0);
        assert_eq!(memory.region().read_i16(globals::RES_ERR as usize).unwrap(), RES_NOT_FOUND);
    }

    #[test]
    fn falls_back_to_the_system_file() {
        let memory = SystemMemory::new();
        let mut mem = MemoryManager::new(memory.clone());
        let app = file_with(b"CODE", 1, vec![0x4E, 0x75]);
        let system = file_with(b"PACK", 4, vec![0xAA, 0xBB]);
        let mut rsrc = ResourceManager::new(memory, app, Some(system));

        let handle = rsrc.get_resource(&mut mem, os_type(b"PACK"), 4).unwrap();
        assert_ne!(handle, 0);
        let region = mem.region_for_handle(handle).unwrap();
        assert_eq!(region.read_u16(0).unwrap(), 0xAABB);
    }
}
