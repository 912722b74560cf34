//! 키 정렬 집계 스토어
//!
//! 그룹 테이블과 드롭 위치 테이블이 공유하는 자료구조입니다. 키는 u64
//! (네임스페이스 inode, 패킹된 MAC, IPv4 주소, 커널 주소)이며 순회는 항상
//! 키 오름차순입니다. 리포트 출력 순서가 이 순서를 그대로 따릅니다.

use std::collections::BTreeMap;

use dropsight_core::error::StoreError;

/// u64 키 기반 정렬 스토어
///
/// 정상 경로는 [`find_or_create_with`](Self::find_or_create_with)이며,
/// [`insert`](Self::insert)는 키 중복 시 [`StoreError::DuplicateKey`]를
/// 반환합니다. 실패한 삽입은 스토어를 변경하지 않습니다.
#[derive(Debug, Default)]
pub struct KeyedStore<V> {
    entries: BTreeMap<u64, V>,
}

impl<V> KeyedStore<V> {
    /// 빈 스토어를 생성합니다.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 스토어가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 키에 해당하는 엔트리를 조회합니다.
    pub fn find(&self, key: u64) -> Option<&V> {
        self.entries.get(&key)
    }

    /// 키에 해당하는 엔트리를 가변 조회합니다.
    pub fn find_mut(&mut self, key: u64) -> Option<&mut V> {
        self.entries.get_mut(&key)
    }

    /// 키에 해당하는 엔트리를 반환하고, 없으면 생성해서 반환합니다.
    pub fn find_or_create_with(&mut self, key: u64, create: impl FnOnce() -> V) -> &mut V {
        self.entries.entry(key).or_insert_with(create)
    }

    /// 새 엔트리를 삽입합니다. 키가 이미 존재하면 실패합니다.
    pub fn insert(&mut self, key: u64, value: V) -> Result<(), StoreError> {
        match self.entries.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(StoreError::DuplicateKey { key })
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// 엔트리를 제거하고 값을 반환합니다.
    pub fn remove(&mut self, key: u64) -> Option<V> {
        self.entries.remove(&key)
    }

    /// 키 오름차순 순회.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// 키 오름차순 가변 순회.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (*k, v))
    }

    /// 조건을 만족하지 않는 엔트리를 모두 제거합니다.
    pub fn retain(&mut self, mut keep: impl FnMut(u64, &mut V) -> bool) {
        self.entries.retain(|k, v| keep(*k, v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_create_returns_same_entry_for_same_key() {
        let mut store: KeyedStore<u32> = KeyedStore::new();
        *store.find_or_create_with(7, || 0) += 1;
        *store.find_or_create_with(7, || 0) += 1;
        assert_eq!(store.len(), 1);
        assert_eq!(*store.find(7).unwrap(), 2);
    }

    #[test]
    fn insert_rejects_duplicate_key_without_mutation() {
        let mut store: KeyedStore<&str> = KeyedStore::new();
        store.insert(1, "first").unwrap();
        let err = store.insert(1, "second").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { key: 1 }));
        // 기존 값 유지
        assert_eq!(*store.find(1).unwrap(), "first");
    }

    #[test]
    fn iteration_is_key_ordered() {
        let mut store: KeyedStore<u8> = KeyedStore::new();
        for key in [42, 3, 17, 99, 1] {
            store.insert(key, 0).unwrap();
        }
        let keys: Vec<u64> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 3, 17, 42, 99]);
    }

    #[test]
    fn remove_returns_value_and_shrinks() {
        let mut store: KeyedStore<u8> = KeyedStore::new();
        store.insert(5, 50).unwrap();
        assert_eq!(store.remove(5), Some(50));
        assert_eq!(store.remove(5), None);
        assert!(store.is_empty());
    }

    #[test]
    fn retain_drops_non_matching_entries() {
        let mut store: KeyedStore<bool> = KeyedStore::new();
        store.insert(1, true).unwrap();
        store.insert(2, false).unwrap();
        store.insert(3, true).unwrap();
        store.retain(|_, alive| *alive);
        let keys: Vec<u64> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 3]);
    }
}
