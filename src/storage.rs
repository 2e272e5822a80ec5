use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::{debug, error, info, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{load_document_from_file, normalize_email, Note, NotesError, Result, User};

/// A record kept in a [`Collection`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Directory name of the collection under the data directory
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

impl Document for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A directory of JSON documents mirrored by an in-memory cache.
///
/// The cache is authoritative once loaded: lookups never touch the disk, so
/// ids coming from requests are never turned into paths unless they already
/// name a stored document.
pub struct Collection<T: Document> {
    /// Directory holding `<first two chars of id>/<id>.json` files
    dir: PathBuf,

    /// In-memory cache of documents, indexed by ID
    cache: Mutex<HashMap<String, T>>,
}

impl<T: Document> Collection<T> {
    /// Opens the collection under `data_dir`, creating its directory and
    /// loading every document found there.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join(T::COLLECTION);

        if !dir.exists() {
            debug!("Collection directory does not exist, creating: {}", dir.display());
            fs::create_dir_all(&dir).map_err(|e| {
                error!("Failed to create collection directory: {}", e);
                NotesError::DirectoryError { path: dir.clone() }
            })?;
        }

        let collection = Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        };
        collection.load()?;

        Ok(collection)
    }

    /// Loads all documents from disk into the in-memory cache
    ///
    /// # Returns
    ///
    /// The number of documents loaded in case of success or an error
    pub fn load(&self) -> Result<usize> {
        let mut buffer = HashMap::with_capacity(100);
        let mut load_errors = 0usize;

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                match load_document_from_file::<T>(path) {
                    Ok(doc) => {
                        buffer.insert(doc.id().to_string(), doc);
                    }
                    Err(e) => {
                        warn!("Failed to load document from {}: {}", path.display(), e);
                        load_errors += 1;
                    }
                }
            }
        }

        if load_errors > 0 {
            error!(
                "Encountered {} errors while loading {}",
                load_errors,
                T::COLLECTION
            );
        }

        let count = buffer.len();
        let mut cache = self.lock()?;
        cache.clear();
        cache.extend(buffer);

        info!("Loaded {} documents into {} cache", count, T::COLLECTION);
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Result<Option<T>> {
        trace!("Retrieving {} document: {}", T::COLLECTION, id);
        Ok(self.lock()?.get(id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Returns clones of every document matching `predicate`.
    pub fn find<F>(&self, predicate: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let cache = self.lock()?;
        debug!("Scanning {} documents in {}", cache.len(), T::COLLECTION);
        Ok(cache.values().filter(|doc| predicate(doc)).cloned().collect())
    }

    /// Returns the first document matching `predicate`.
    pub fn find_one<F>(&self, predicate: F) -> Result<Option<T>>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.lock()?.values().find(|doc| predicate(doc)).cloned())
    }

    /// Inserts a new document. Fails if the id is already taken.
    pub fn insert(&self, doc: T) -> Result<()> {
        self.insert_unless(doc, |_| false).map(|_| ())
    }

    /// Inserts `doc` unless an existing document makes `clash` return true.
    ///
    /// The check and the write happen under one lock, so two concurrent
    /// inserts cannot both pass the check. Returns whether the document
    /// was inserted.
    pub fn insert_unless<F>(&self, doc: T, clash: F) -> Result<bool>
    where
        F: Fn(&T) -> bool,
    {
        let mut cache = self.lock()?;

        if cache.contains_key(doc.id()) {
            return Err(NotesError::DocumentAlreadyExists {
                id: doc.id().to_string(),
            });
        }
        if cache.values().any(|existing| clash(existing)) {
            debug!("Insert into {} rejected by uniqueness check", T::COLLECTION);
            return Ok(false);
        }

        self.write_document(&doc)?;
        cache.insert(doc.id().to_string(), doc);
        Ok(true)
    }

    /// Overwrites an existing document. Last write wins.
    pub fn replace(&self, doc: T) -> Result<()> {
        let mut cache = self.lock()?;

        if !cache.contains_key(doc.id()) {
            return Err(NotesError::NoteNotFound {
                id: doc.id().to_string(),
            });
        }

        self.write_document(&doc)?;
        cache.insert(doc.id().to_string(), doc);
        Ok(())
    }

    /// Hard-deletes a document, returning it if it existed.
    pub fn remove(&self, id: &str) -> Result<Option<T>> {
        let mut cache = self.lock()?;

        if !cache.contains_key(id) {
            debug!("Nothing to remove in {} for id {}", T::COLLECTION, id);
            return Ok(None);
        }

        let file_path = self.document_path(id);
        match fs::remove_file(&file_path) {
            Ok(()) => trace!("Removed file {}", file_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Document file already gone: {}", file_path.display());
            }
            Err(e) => {
                error!("Failed to remove {}: {}", file_path.display(), e);
                return Err(NotesError::Io(e));
            }
        }

        Ok(cache.remove(id))
    }

    /// Writes a document using a temp file and rename so a crash never
    /// leaves a half-written file behind.
    fn write_document(&self, doc: &T) -> Result<()> {
        let file_path = self.document_path(doc.id());
        debug!("File path for document: {}", file_path.display());

        let dir = file_path.parent().unwrap_or(&self.dir);
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create directory {}: {}", dir.display(), e);
                NotesError::Io(e)
            })?;
        }

        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NotesError::Io(e)
        })?;

        let json = serde_json::to_string_pretty(doc).map_err(|e| {
            error!("Failed to serialize document: {}", e);
            NotesError::Serialization(e)
        })?;

        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;

        temp_file.persist(&file_path).map_err(|e| {
            error!(
                "Failed to persist file {}: {}",
                file_path.display(),
                e.error
            );
            NotesError::Io(e.error)
        })?;

        trace!("Document written: {}", doc.id());
        Ok(())
    }

    /// Path with structure: dir/first_2_chars_of_id/id.json
    fn document_path(&self, id: &str) -> PathBuf {
        let prefix = id.get(0..2).unwrap_or(id);
        self.dir.join(prefix).join(format!("{}.json", id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, T>>> {
        self.cache.lock().map_err(|_| NotesError::LockAcquisitionFailed {
            message: format!("Failed to acquire lock on {} cache", T::COLLECTION),
        })
    }
}

/// The document store: one collection of notes and one of users.
pub struct NoteStorage {
    data_dir: PathBuf,
    notes: Collection<Note>,
    users: Collection<User>,
}

impl NoteStorage {
    /// Opens (or creates) the store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        info!("Opening note storage at {}", data_dir.display());

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).map_err(|e| {
                error!("Failed to create data directory: {}", e);
                NotesError::DirectoryError {
                    path: data_dir.clone(),
                }
            })?;
        }

        let notes = Collection::open(&data_dir)?;
        let users = Collection::open(&data_dir)?;

        Ok(Self {
            data_dir,
            notes,
            users,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// All notes owned by `user_id`, oldest first.
    pub fn notes_for_user(&self, user_id: &str) -> Result<Vec<Note>> {
        let mut notes = self.notes.find(|note| note.is_owned_by(user_id))?;
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(notes)
    }

    pub fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
        self.notes.get(note_id)
    }

    pub fn insert_note(&self, note: Note) -> Result<()> {
        info!("Saving note: {}", note.id);
        self.notes.insert(note)
    }

    pub fn save_note(&self, note: Note) -> Result<()> {
        info!("Updating note: {}", note.id);
        self.notes.replace(note)
    }

    pub fn delete_note(&self, note_id: &str) -> Result<Option<Note>> {
        info!("Deleting note: {}", note_id);
        self.notes.remove(note_id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        self.users.find_one(|user| user.email == email)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.users.get(user_id)
    }

    /// Inserts a user unless the email is already registered.
    pub fn insert_user(&self, user: User) -> Result<bool> {
        let email = user.email.clone();
        self.users.insert_unless(user, |existing| existing.email == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn note(title: &str, user: &str) -> Note {
        Note::new(title.into(), "body".into(), user.into())
    }

    #[test]
    fn notes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let first = note("Groceries", "u1");
        {
            let storage = NoteStorage::open(dir.path()).unwrap();
            storage.insert_note(first.clone()).unwrap();
        }

        let storage = NoteStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get_note(&first.id).unwrap(), Some(first));
    }

    #[test]
    fn notes_for_user_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let storage = NoteStorage::open(dir.path()).unwrap();

        let a = note("a", "u1");
        let mut b = note("b", "u1");
        b.created_at = a.created_at + chrono::Duration::seconds(1);
        storage.insert_note(b.clone()).unwrap();
        storage.insert_note(a.clone()).unwrap();
        storage.insert_note(note("c", "u2")).unwrap();

        let titles: Vec<_> = storage
            .notes_for_user("u1")
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn delete_removes_file_and_is_graceful_twice() {
        let dir = TempDir::new().unwrap();
        let storage = NoteStorage::open(dir.path()).unwrap();
        let n = note("a", "u1");
        storage.insert_note(n.clone()).unwrap();

        assert!(storage.delete_note(&n.id).unwrap().is_some());
        assert!(storage.delete_note(&n.id).unwrap().is_none());

        let reopened = NoteStorage::open(dir.path()).unwrap();
        assert!(reopened.get_note(&n.id).unwrap().is_none());
    }

    #[test]
    fn replace_requires_existing_document() {
        let dir = TempDir::new().unwrap();
        let storage = NoteStorage::open(dir.path()).unwrap();

        let result = storage.save_note(note("ghost", "u1"));
        assert!(matches!(result, Err(NotesError::NoteNotFound { .. })));
    }

    #[test]
    fn user_email_is_unique() {
        let dir = TempDir::new().unwrap();
        let storage = NoteStorage::open(dir.path()).unwrap();

        let first = User::new("Ann".into(), "ann@example.com", "h".into());
        let second = User::new("Other".into(), "ANN@example.com", "h".into());

        assert!(storage.insert_user(first).unwrap());
        assert!(!storage.insert_user(second).unwrap());
        assert!(storage
            .find_user_by_email(" Ann@Example.com")
            .unwrap()
            .is_some());
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let notes_dir = dir.path().join("notes").join("xx");
        fs::create_dir_all(&notes_dir).unwrap();
        fs::write(notes_dir.join("broken.json"), "{ not json").unwrap();
        fs::write(notes_dir.join("readme.txt"), "ignored").unwrap();

        let storage = NoteStorage::open(dir.path()).unwrap();
        assert!(storage.notes_for_user("u1").unwrap().is_empty());
    }
}
