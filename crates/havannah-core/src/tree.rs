//! Compacting arena for search-tree nodes
//!
//! The arena mallocs one 16 MiB chunk at a time and packs variable-size
//! child blocks into them. Freed blocks go onto a freelist indexed by
//! capacity and are never handed out for a smaller request, so the
//! chunks themselves never fragment. Every block stores a back-pointer
//! to the handle that owns it and every node exposes its child handle,
//! which lets [`CompactTree::compact`] slide live blocks towards the
//! start of the arena, repair both directions of the links, and return
//! whole chunks to the OS.
//!
//! Allocation and deallocation are lock-free (compare-and-swap on the
//! chunk tail and on the freelist heads); compaction is stop-the-world
//! and requires exclusive access.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::{self, null_mut};
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

/// Chunk granularity in bytes.
const CHUNK_SIZE: u32 = 16 * 1024 * 1024;

/// Chunk memory alignment; block layouts must divide into this.
const CHUNK_ALIGN: usize = 8;

/// Maximum number of nodes allocated at once; bounds the freelist.
pub const MAX_NUM: usize = 300;

/// Handle sentinel marking a child block mid-installation.
const LOCK: usize = 1;

/// A node storable in a [`CompactTree`].
///
/// Nodes must be plain data apart from their child handle, and must
/// expose that handle so relocation can repoint grandchildren blocks.
pub trait TreeNode: Default + Sized {
    fn children(&self) -> &Children<Self>;
}

/// Block header preceding a contiguous array of nodes.
///
/// `header` is a sanity tag derived from the block's own address; zero
/// marks a vacant block sitting in a freelist. While live, `link`
/// points back at the owning handle; while vacant it is the freelist
/// chain.
#[repr(C)]
struct Data<N: TreeNode> {
    header: u32,
    capacity: u16,
    used: u16,
    link: Link<N>,
    children: [N; 0],
}

union Link<N: TreeNode> {
    parent: *mut Children<N>,
    next_free: *mut Data<N>,
}

impl<N: TreeNode> Data<N> {
    #[inline]
    fn block_size(capacity: usize) -> usize {
        std::mem::size_of::<Data<N>>() + capacity * std::mem::size_of::<N>()
    }

    #[inline]
    unsafe fn payload(d: *mut Data<N>) -> *mut N {
        ptr::addr_of_mut!((*d).children) as *mut N
    }

    /// Placement-construct a block: non-zero address-derived header,
    /// default-constructed nodes, the supplied back-pointer.
    unsafe fn init(d: *mut Data<N>, num: u16, parent: *mut Children<N>) -> *mut Data<N> {
        let mut header = ((d as usize) >> 2) as u32 & 0x00FF_FFFF;
        if header == 0 {
            header = 0x00AB_CDF3;
        }
        (*d).header = header;
        (*d).capacity = num;
        (*d).used = num;
        (*d).link.parent = parent;
        let base = Self::payload(d);
        for i in 0..num as usize {
            base.add(i).write(N::default());
        }
        d
    }

    /// The block was byte-copied from `old` to `d`; rewrite the owning
    /// handle and every child block's back-pointer.
    unsafe fn relocate(d: *mut Data<N>, old: *mut Data<N>) {
        assert!((*d).header != 0, "relocating a vacant block");
        let parent = (*d).link.parent;
        assert_eq!(
            (*parent).data.load(Ordering::Relaxed),
            old,
            "owning handle does not point at the old location"
        );
        (*parent).data.store(d, Ordering::Relaxed);

        let base = Self::payload(d);
        for i in 0..(*d).used as usize {
            let handle = (*base.add(i)).children() as *const Children<N> as *mut Children<N>;
            let child = (*handle).data.load(Ordering::Relaxed);
            if child as usize > LOCK {
                (*child).link.parent = handle;
            }
        }
    }
}

/// A fixed slot in a parent node that points at a relocatable child
/// block. The block points back at the slot, so the slot address must
/// stay stable for the block's lifetime.
pub struct Children<N: TreeNode> {
    data: AtomicPtr<Data<N>>,
}

impl<N: TreeNode> Default for Children<N> {
    fn default() -> Self {
        Children::new()
    }
}

impl<N: TreeNode> Children<N> {
    pub const fn new() -> Children<N> {
        Children {
            data: AtomicPtr::new(null_mut()),
        }
    }

    /// Claim the empty handle for installation. Exactly one caller wins.
    pub fn lock(&self) -> bool {
        self.data
            .compare_exchange(
                null_mut(),
                LOCK as *mut Data<N>,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Release a claimed-but-unused handle.
    pub fn unlock(&self) -> bool {
        self.data
            .compare_exchange(
                LOCK as *mut Data<N>,
                null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Allocate a block of `num` nodes owned by this handle.
    pub fn alloc(&mut self, num: u16, ct: &CompactTree<N>) -> u32 {
        assert!(
            self.data.load(Ordering::Acquire).is_null(),
            "handle already has children"
        );
        let d = ct.alloc(num, self as *mut Children<N>);
        self.data.store(d, Ordering::Release);
        num as u32
    }

    /// Return this handle's block to the freelist. Returns the number
    /// of nodes it held. The nodes' own subtrees must be gone already.
    pub fn dealloc(&self, ct: &CompactTree<N>) -> u32 {
        let t = self.data.load(Ordering::Acquire);
        if t as usize <= LOCK {
            return 0;
        }
        if self
            .data
            .compare_exchange(t, null_mut(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        let num = unsafe { (*t).used as u32 };
        ct.dealloc(t);
        num
    }

    /// Exchange the blocks of two handles, fixing both back-pointers.
    pub fn swap(&mut self, other: &mut Children<N>) {
        let a = self.data.load(Ordering::Relaxed);
        let b = other.data.load(Ordering::Relaxed);
        self.data.store(b, Ordering::Relaxed);
        other.data.store(a, Ordering::Relaxed);
        unsafe {
            if b as usize > LOCK {
                (*b).link.parent = self as *mut Children<N>;
            }
            if a as usize > LOCK {
                (*a).link.parent = other as *mut Children<N>;
            }
        }
    }

    /// Drop the nodes past `n`, keeping the block and its capacity; a
    /// later compaction reclaims the gap. Returns the number removed.
    pub fn shrink(&mut self, n: u16) -> u32 {
        let d = self.data.load(Ordering::Relaxed);
        assert!(d as usize > LOCK, "shrinking an empty handle");
        unsafe {
            assert!(n > 0 && n <= (*d).capacity && n <= (*d).used);
            #[cfg(debug_assertions)]
            {
                let base = Data::payload(d);
                for i in n as usize..(*d).used as usize {
                    debug_assert!(
                        (*base.add(i)).children().empty(),
                        "shrinking away a node that still has children"
                    );
                }
            }
            let diff = ((*d).used - n) as u32;
            (*d).used = n;
            diff
        }
    }

    #[inline]
    pub fn num(&self) -> u32 {
        let d = self.data.load(Ordering::Acquire);
        if d as usize > LOCK {
            unsafe { (*d).used as u32 }
        } else {
            0
        }
    }

    #[inline]
    pub fn empty(&self) -> bool {
        self.num() == 0
    }

    pub fn as_slice(&self) -> &[N] {
        let d = self.data.load(Ordering::Acquire);
        if d as usize > LOCK {
            unsafe { std::slice::from_raw_parts(Data::payload(d) as *const N, (*d).used as usize) }
        } else {
            &[]
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [N] {
        let d = self.data.load(Ordering::Acquire);
        if d as usize > LOCK {
            unsafe { std::slice::from_raw_parts_mut(Data::payload(d), (*d).used as usize) }
        } else {
            &mut []
        }
    }

    /// Block/handle round trip, for assertions.
    #[cfg(test)]
    fn back_pointer_ok(&self) -> bool {
        let d = self.data.load(Ordering::Relaxed);
        if d as usize <= LOCK {
            return true;
        }
        unsafe { std::ptr::eq((*d).link.parent, self) && (*d).header != 0 }
    }
}

impl<N: TreeNode> Drop for Children<N> {
    fn drop(&mut self) {
        debug_assert!(
            self.data.load(Ordering::Relaxed) as usize <= LOCK,
            "dropping a handle that still owns a block"
        );
    }
}

/// One malloc'd slab in the arena's chunk list.
struct Chunk {
    next: AtomicPtr<Chunk>,
    id: u32,
    capacity: u32,
    used: AtomicU32,
    mem: *mut u8,
}

impl Chunk {
    fn layout(capacity: u32) -> Layout {
        Layout::from_size_align(capacity as usize, CHUNK_ALIGN).expect("chunk layout")
    }

    fn new(capacity: u32, id: u32) -> *mut Chunk {
        let mem = unsafe { alloc_zeroed(Self::layout(capacity)) };
        assert!(!mem.is_null(), "chunk allocation failed");
        Box::into_raw(Box::new(Chunk {
            next: AtomicPtr::new(null_mut()),
            id,
            capacity,
            used: AtomicU32::new(0),
            mem,
        }))
    }

    /// Free `c` and every chunk after it.
    unsafe fn free_chain(mut c: *mut Chunk) {
        while !c.is_null() {
            let next = (*c).next.load(Ordering::Relaxed);
            dealloc((*c).mem, Self::layout((*c).capacity));
            drop(Box::from_raw(c));
            c = next;
        }
    }
}

/// Arena of relocatable child blocks; see the module docs.
pub struct CompactTree<N: TreeNode> {
    head: *mut Chunk,
    current: AtomicPtr<Chunk>,
    num_chunks: AtomicU32,
    freelist: [AtomicPtr<Data<N>>; MAX_NUM],
    mem_used: AtomicU64,
}

unsafe impl<N: TreeNode + Send> Send for CompactTree<N> {}
unsafe impl<N: TreeNode + Send> Sync for CompactTree<N> {}

impl<N: TreeNode> Default for CompactTree<N> {
    fn default() -> Self {
        CompactTree::new()
    }
}

impl<N: TreeNode> CompactTree<N> {
    pub fn new() -> CompactTree<N> {
        // block layouts must tile the 8-byte-aligned chunks
        assert!(std::mem::align_of::<Data<N>>() <= CHUNK_ALIGN);
        assert!(std::mem::size_of::<Data<N>>() % CHUNK_ALIGN == 0);
        assert!(std::mem::size_of::<N>() % std::mem::align_of::<Data<N>>() == 0);

        let head = Chunk::new(CHUNK_SIZE, 0);
        CompactTree {
            head,
            current: AtomicPtr::new(head),
            num_chunks: AtomicU32::new(1),
            freelist: std::array::from_fn(|_| AtomicPtr::new(null_mut())),
            mem_used: AtomicU64::new(0),
        }
    }

    /// Memory malloc'd from the OS.
    pub fn mem_arena(&self) -> u64 {
        unsafe {
            let mut c = self.current.load(Ordering::Acquire);
            while !(*c).next.load(Ordering::Acquire).is_null() {
                c = (*c).next.load(Ordering::Acquire);
            }
            ((*c).id as u64 + 1) * CHUNK_SIZE as u64
        }
    }

    /// Memory in use or sitting in a freelist; approximates what the OS
    /// sees as occupied.
    pub fn mem_alloced(&self) -> u64 {
        unsafe {
            let c = self.current.load(Ordering::Acquire);
            (*c).id as u64 * CHUNK_SIZE as u64 + (*c).used.load(Ordering::Acquire) as u64
        }
    }

    /// Bytes held by live blocks, headers included. Counts capacity, so
    /// blocks shrunk since the last compaction are over-reported.
    pub fn mem_in_use(&self) -> u64 {
        self.mem_used.load(Ordering::Relaxed)
    }

    /// Allocate a block of `num` nodes, recording the owning handle.
    fn alloc(&self, num: u16, parent: *mut Children<N>) -> *mut Data<N> {
        assert!(num > 0 && (num as usize) < MAX_NUM);
        let size = Data::<N>::block_size(num as usize);
        debug_assert_eq!(size % CHUNK_ALIGN, 0);
        self.mem_used.fetch_add(size as u64, Ordering::Relaxed);

        // freelist first
        loop {
            let t = self.freelist[num as usize].load(Ordering::Acquire);
            if t.is_null() {
                break;
            }
            let next = unsafe { (*t).link.next_free };
            if self.freelist[num as usize]
                .compare_exchange_weak(t, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return unsafe { Data::init(t, num, parent) };
            }
        }

        // carve from the chunk tail
        unsafe {
            loop {
                let c = self.current.load(Ordering::Acquire);
                let used = (*c).used.load(Ordering::Acquire);
                if used as usize + size <= (*c).capacity as usize {
                    if (*c)
                        .used
                        .compare_exchange(
                            used,
                            used + size as u32,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return Data::init((*c).mem.add(used as usize) as *mut Data<N>, num, parent);
                    }
                } else if !(*c).next.load(Ordering::Acquire).is_null() {
                    // advance; CAS so a racing thread cannot skip a chunk
                    let next = (*c).next.load(Ordering::Acquire);
                    let _ = self.current.compare_exchange(
                        c,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                } else {
                    let fresh = Chunk::new(CHUNK_SIZE, 0);
                    let mut tail = c;
                    loop {
                        while !(*tail).next.load(Ordering::Acquire).is_null() {
                            tail = (*tail).next.load(Ordering::Acquire);
                        }
                        (*fresh).id = (*tail).id + 1;
                        if (*tail)
                            .next
                            .compare_exchange(
                                null_mut(),
                                fresh,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            // current is deliberately not advanced here:
                            // with two racing appenders this may not be
                            // the successor of the current chunk
                            self.num_chunks.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Return a block to the freelist for its capacity.
    fn dealloc(&self, d: *mut Data<N>) {
        unsafe {
            assert!(
                (*d).header > 0 && (*d).capacity > 0 && ((*d).capacity as usize) < MAX_NUM,
                "deallocating a corrupt block"
            );
            #[cfg(debug_assertions)]
            {
                let base = Data::payload(d);
                for i in 0..(*d).used as usize {
                    debug_assert!(
                        (*base.add(i)).children().empty(),
                        "deallocating a block whose nodes still have children"
                    );
                }
            }
            let cap = (*d).capacity as usize;
            let size = Data::<N>::block_size(cap);
            self.mem_used.fetch_sub(size as u64, Ordering::Relaxed);

            (*d).header = 0;
            (*d).used = (*d).capacity;
            loop {
                let t = self.freelist[cap].load(Ordering::Acquire);
                (*d).link.next_free = t;
                if self.freelist[cap]
                    .compare_exchange_weak(t, d, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break;
                }
            }
        }
    }

    /// Stop-the-world compaction; the caller must hold every worker.
    ///
    /// `arenasize` is how much allocated memory to keep around as a
    /// fraction of the current footprint (0 frees everything unused, 1
    /// keeps it all). `generationsize` is how far through the arena to
    /// only rebuild the freelist without moving blocks; 0.2 - 0.6 skips
    /// the old, stable part of the tree cheaply.
    pub fn compact(&mut self, arenasize: f32, generationsize: f32) {
        assert!((0.0..=1.0).contains(&arenasize));
        assert!((0.0..=1.0).contains(&generationsize));

        self.mem_used.store(0, Ordering::Relaxed);

        unsafe {
            if (*self.head).used.load(Ordering::Relaxed) == 0 {
                return;
            }

            for f in &self.freelist {
                f.store(null_mut(), Ordering::Relaxed);
            }

            let cur_id = (*self.current.load(Ordering::Relaxed)).id;
            let mut schunk = self.head;
            let mut soff: usize = 0;
            // the chunk holding the last block we visited, in case the
            // walk runs off the end of the chain
            let mut prev = self.head;

            // phase 1: through the older generation, only push vacant
            // blocks onto the freelist
            let generation_id = generationsize * cur_id as f32;
            while !schunk.is_null() && ((*schunk).id as f32) < generation_id {
                let s = (*schunk).mem.add(soff) as *mut Data<N>;
                let cap = (*s).capacity as usize;
                assert!(cap > 0 && cap < MAX_NUM, "corrupt block in arena walk");
                let size = Data::<N>::block_size(cap);

                if (*s).header == 0 {
                    (*s).link.next_free = self.freelist[cap].load(Ordering::Relaxed);
                    self.freelist[cap].store(s, Ordering::Relaxed);
                } else {
                    self.mem_used.fetch_add(size as u64, Ordering::Relaxed);
                }

                soff += size;
                while !schunk.is_null() && (*schunk).used.load(Ordering::Relaxed) as usize <= soff {
                    prev = schunk;
                    schunk = (*schunk).next.load(Ordering::Relaxed);
                    soff = 0;
                }
            }

            let mut dchunk = schunk;
            let mut doff = soff;

            // phase 2: slide the remaining live blocks left
            while !schunk.is_null() {
                let s = (*schunk).mem.add(soff) as *mut Data<N>;
                let cap = (*s).capacity as usize;
                assert!(cap > 0 && cap < MAX_NUM, "corrupt block in arena walk");
                let ssize = Data::<N>::block_size(cap);

                if (*s).header != 0 {
                    let used = (*s).used as usize;
                    assert!(used > 0 && used <= cap);
                    let dsize = Data::<N>::block_size(used);

                    let d: *mut Data<N>;
                    loop {
                        let free = self.freelist[used].load(Ordering::Relaxed);
                        if !free.is_null() {
                            // a vacated slot of exactly the right size
                            self.freelist[used].store((*free).link.next_free, Ordering::Relaxed);
                            d = free;
                            break;
                        } else if doff + dsize <= (*dchunk).capacity as usize {
                            // the destination cursor must trail the source
                            assert!(
                                (*schunk).id > (*dchunk).id || (schunk == dchunk && soff >= doff),
                                "compaction would move a block right"
                            );
                            d = (*dchunk).mem.add(doff) as *mut Data<N>;
                            doff += dsize;
                            break;
                        } else {
                            (*dchunk).used.store(doff as u32, Ordering::Relaxed);
                            ptr::write_bytes(
                                (*dchunk).mem.add(doff),
                                0,
                                (*dchunk).capacity as usize - doff,
                            );
                            dchunk = (*dchunk).next.load(Ordering::Relaxed);
                            doff = 0;
                        }
                    }

                    (*s).capacity = (*s).used;
                    if s != d {
                        ptr::copy(s as *const u8, d as *mut u8, dsize);
                        Data::relocate(d, s);
                    }
                    self.mem_used.fetch_add(dsize as u64, Ordering::Relaxed);
                }

                soff += ssize;
                while !schunk.is_null() && (*schunk).used.load(Ordering::Relaxed) as usize <= soff {
                    prev = schunk;
                    schunk = (*schunk).next.load(Ordering::Relaxed);
                    soff = 0;
                }
            }

            // the walk consumed every chunk inside the generation window
            if dchunk.is_null() {
                dchunk = prev;
                doff = (*dchunk).used.load(Ordering::Relaxed) as usize;
            }

            // phase 3: give surplus chunks back to the OS
            let mut del = dchunk;
            while !(*del).next.load(Ordering::Relaxed).is_null()
                && ((*del).id as f32) < arenasize * cur_id as f32
            {
                del = (*del).next.load(Ordering::Relaxed);
                (*del).used.store(0, Ordering::Relaxed);
            }
            let surplus = (*del).next.swap(null_mut(), Ordering::Relaxed);
            if !surplus.is_null() {
                Chunk::free_chain(surplus);
                self.num_chunks.store((*del).id + 1, Ordering::Relaxed);
            }

            (*dchunk).used.store(doff as u32, Ordering::Relaxed);
            self.current.store(dchunk, Ordering::Relaxed);
            ptr::write_bytes(
                (*dchunk).mem.add(doff),
                0,
                (*dchunk).capacity as usize - doff,
            );
        }
    }
}

impl<N: TreeNode> Drop for CompactTree<N> {
    fn drop(&mut self) {
        unsafe {
            Chunk::free_chain(self.head);
        }
        self.head = null_mut();
    }
}
